//! # Image pose records
//!
//! One [`Image`] identifies a single capture event of the car-mounted rig:
//! where the vehicle was, which way it pointed, and which file on disk the
//! frame came from. Images are created once during bulk ingest of the pose
//! trajectory table and never mutated afterwards; detections reference them by
//! [`ImageId`].
//!
//! [`ImageSet`] holds the images alongside a composite-key lookup
//! (subfolder, frame, filename, camera index) used to resolve which image a
//! detection batch belongs to.

use std::collections::HashMap;

use log::warn;

use crate::constants::{Degree, ImageId};
use crate::geodesy::{normalize_heading, validate_lonlat};

/// Metadata on one image recorded from the car-mounted camera.
///
/// # Fields
///
/// * `lon`, `lat` - Vehicle position when the image was taken (WGS84 degrees)
/// * `heading` - Vehicle compass heading, normalized to [0, 360)
/// * `neighborhood` - Neighborhood where the frame was taken
/// * `subfolder` - Subfolder where the image is stored (part of the file path)
/// * `frame` - Frame identifier (part of the file name)
/// * `image_fname` - Image file name
/// * `cam` - Camera index on the rig
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub lon: Degree,
    pub lat: Degree,
    pub heading: Degree,
    pub neighborhood: String,
    pub subfolder: String,
    pub frame: String,
    pub image_fname: String,
    pub cam: u8,
}

impl Image {
    /// Relative path of the image file, `subfolder/image_fname`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.subfolder, self.image_fname)
    }
}

/// Composite lookup key identifying one capture event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ImageKey {
    subfolder: String,
    frame: String,
    image_fname: String,
    cam: u8,
}

/// Container for all ingested images with constant-time lookup by capture identity.
#[derive(Debug, Default)]
pub struct ImageSet {
    images: Vec<Image>,
    by_key: HashMap<ImageKey, ImageId>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one image, validating its coordinates and normalizing its heading.
    ///
    /// Invalid coordinates are a record-level error: the image is skipped with
    /// a warning and `None` is returned, the batch continues.
    pub fn add(&mut self, mut image: Image) -> Option<ImageId> {
        if let Err(err) = validate_lonlat(image.lon, image.lat) {
            warn!(
                "skipping image {}/{} cam {}: {err}",
                image.subfolder, image.image_fname, image.cam
            );
            return None;
        }
        image.heading = normalize_heading(image.heading);

        let key = ImageKey {
            subfolder: image.subfolder.clone(),
            frame: image.frame.clone(),
            image_fname: image.image_fname.clone(),
            cam: image.cam,
        };
        let id = self.images.len();
        self.images.push(image);
        self.by_key.insert(key, id);
        Some(id)
    }

    /// Resolve the image captured at (subfolder, frame, filename, camera index).
    pub fn find(&self, subfolder: &str, frame: &str, image_fname: &str, cam: u8) -> Option<ImageId> {
        let key = ImageKey {
            subfolder: subfolder.to_string(),
            frame: frame.to_string(),
            image_fname: image_fname.to_string(),
            cam,
        };
        self.by_key.get(&key).copied()
    }

    pub fn get(&self, id: ImageId) -> Option<&Image> {
        self.images.get(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageId, &Image)> {
        self.images.iter().enumerate()
    }
}
