//! # Detection records
//!
//! One [`Detection`] is a single bounding-box classification result tied to one
//! image: the box, the class, the model confidence, and the geometry derived at
//! creation time by the ray builder (absolute bearing, detection ray, buffered
//! search extent). The geometric fields are computed once and never recomputed.
//!
//! Ownership follows flat records with explicit ids rather than object graphs:
//! a detection holds a nullable [`BuildingId`] back-reference set by the
//! matcher, and a building keeps the list of its linked [`DetectionId`]s.

use geo::{LineString, Polygon};

use crate::constants::{BuildingId, ClassId, Confidence, Degree, DetectionId, ImageId};

/// Normalized bounding box, proportional coordinates on [0, 1].
///
/// # Fields
///
/// * `x_min`, `y_min` - Top-left corner
/// * `x_max`, `y_max` - Bottom-right corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Normalized horizontal midpoint of the box.
    ///
    /// The bearing of a detection is derived from this midpoint alone; the box
    /// width carries no angular-spread information here.
    pub fn mean_x(&self) -> f64 {
        (self.x_min + self.x_max) / 2.0
    }
}

/// Single classified detection within an image, with derived ray geometry.
///
/// # Fields
///
/// * `image` - The capture event this detection belongs to
/// * `bbox` - Normalized bounding box
/// * `class_id`, `class_str` - Detector class
/// * `confidence` - Model confidence on [0, 1]
/// * `neighborhood` - Copied from the owning image, used to scope matching
/// * `angle` - Absolute compass bearing of the detection, on [0, 360)
/// * `ray` - Two-point linestring from the image position toward the detection
/// * `search_area` - Rectangular extent of the buffered ray, the coarse
///   containment filter used by the matcher
/// * `building` - Building this detection was linked to, if any. The only
///   field mutated after creation.
#[derive(Debug, Clone)]
pub struct Detection {
    pub image: ImageId,
    pub bbox: BoundingBox,
    pub class_id: ClassId,
    pub class_str: String,
    pub confidence: Confidence,
    pub neighborhood: String,
    pub angle: Degree,
    pub ray: LineString<f64>,
    pub search_area: Polygon<f64>,
    pub building: Option<BuildingId>,
}

/// Ordered container for all ray-built detections of a run.
#[derive(Debug, Default)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detection: Detection) -> DetectionId {
        let id = self.detections.len();
        self.detections.push(detection);
        id
    }

    pub fn get(&self, id: DetectionId) -> Option<&Detection> {
        self.detections.get(id)
    }

    pub fn get_mut(&mut self, id: DetectionId) -> Option<&mut Detection> {
        self.detections.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DetectionId, &Detection)> {
        self.detections.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DetectionId, &mut Detection)> {
        self.detections.iter_mut().enumerate()
    }
}
