//! # Sightline: triangulation run configuration
//!
//! This module defines the [`Sightline`] struct, the central context that wires
//! together everything one triangulation run needs:
//!
//! 1. **Camera geometry**: field of view, camera-index→side mapping.
//! 2. **Ray construction**: ray length, lateral buffer distance, buffer
//!    sampling tolerance.
//! 3. **Class semantics**: class-id→label maps for building parts and
//!    building properties, the ordered property groups, and the part-name list
//!    driving consolidation.
//! 4. **Output shaping**: metadata key prefix, optional class filter.
//!
//! Everything is an explicit field rather than module-level state, so several
//! configurations (different cities, different label sets) can run
//! concurrently without cross-contamination.
//!
//! ## Typical usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use sightline::sightline::{PropertyGroup, Sightline};
//!
//! let properties_map = HashMap::from([(1, "brick".to_string()), (2, "wood".to_string())]);
//! let parts_map = HashMap::from([(1, "window".to_string()), (2, "door".to_string())]);
//! let groups = vec![PropertyGroup {
//!     name: "material".to_string(),
//!     labels: vec!["brick".to_string(), "wood".to_string()],
//! }];
//! let parts = vec!["window".to_string(), "door".to_string()];
//!
//! let config = Sightline::new(parts_map, properties_map, groups, parts)
//!     .with_ray_length(25.0);
//! assert_eq!(config.ray_length, 25.0);
//! ```

use std::collections::{HashMap, HashSet};

use crate::constants::{
    ClassId, Degree, Meter, DEFAULT_BUFFER_DISTANCE_M, DEFAULT_FOV_DEG, DEFAULT_METADATA_PREFIX,
    DEFAULT_RAY_LENGTH_M, DEFAULT_SIMPLIFY_TOLERANCE_M,
};
use crate::visual::{default_camera_sides, CameraSide};

/// Named category of mutually exclusive class labels (e.g. group `material`
/// containing `brick`, `wood`, ...). Label order defines the deterministic
/// tie-break of property consolidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyGroup {
    pub name: String,
    pub labels: Vec<String>,
}

/// Configuration façade for one triangulation run.
#[derive(Debug, Clone)]
pub struct Sightline {
    /// Horizontal field of view of one camera, degrees.
    pub fov: Degree,
    /// Length of a detection ray, meters.
    pub ray_length: Meter,
    /// Lateral buffer distance around a ray, meters.
    pub buffer_distance: Meter,
    /// Chord tolerance bounding buffer vertex counts, meters.
    pub simplify_tolerance: Meter,
    /// Prefix prepended to consolidated metadata keys.
    pub metadata_prefix: String,
    /// Camera-index→side lookup of the capture rig.
    pub camera_sides: HashMap<u8, CameraSide>,
    /// Class-id→label map for building parts.
    pub parts_map: HashMap<ClassId, String>,
    /// Class-id→label map for building properties.
    pub properties_map: HashMap<ClassId, String>,
    /// Ordered property groups used by the consolidator.
    pub property_groups: Vec<PropertyGroup>,
    /// Part labels counted by the consolidator.
    pub part_names: Vec<String>,
    /// When set, only detections with these class labels are ray-built.
    pub class_filter: Option<HashSet<String>>,
}

impl Sightline {
    /// Construct a run configuration with default camera geometry.
    ///
    /// Arguments
    /// -----------------
    /// * `parts_map`: class-id→label map for building parts.
    /// * `properties_map`: class-id→label map for building properties.
    /// * `property_groups`: ordered property groups for consolidation.
    /// * `part_names`: part labels counted during consolidation.
    pub fn new(
        parts_map: HashMap<ClassId, String>,
        properties_map: HashMap<ClassId, String>,
        property_groups: Vec<PropertyGroup>,
        part_names: Vec<String>,
    ) -> Self {
        Sightline {
            fov: DEFAULT_FOV_DEG,
            ray_length: DEFAULT_RAY_LENGTH_M,
            buffer_distance: DEFAULT_BUFFER_DISTANCE_M,
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE_M,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            camera_sides: default_camera_sides(),
            parts_map,
            properties_map,
            property_groups,
            part_names,
            class_filter: None,
        }
    }

    pub fn with_fov(mut self, fov: Degree) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_ray_length(mut self, ray_length: Meter) -> Self {
        self.ray_length = ray_length;
        self
    }

    pub fn with_buffer_distance(mut self, buffer_distance: Meter) -> Self {
        self.buffer_distance = buffer_distance;
        self
    }

    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    pub fn with_camera_sides(mut self, camera_sides: HashMap<u8, CameraSide>) -> Self {
        self.camera_sides = camera_sides;
        self
    }

    pub fn with_class_filter(mut self, classes: impl IntoIterator<Item = String>) -> Self {
        self.class_filter = Some(classes.into_iter().collect());
        self
    }

    /// Whether a class label passes the configured filter.
    pub fn class_included(&self, class_str: &str) -> bool {
        match &self.class_filter {
            Some(filter) => filter.contains(class_str),
            None => true,
        }
    }
}
