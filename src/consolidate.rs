//! # Metadata consolidation
//!
//! Reduces the many noisy per-image detections linked to one building into a
//! single authoritative metadata record, in two independent passes:
//!
//! - **Properties**: within each property group, confidences of all linked
//!   detections are summed per label and the label with the largest sum wins.
//!   Repeated weak observations can therefore outvote a single strong but
//!   isolated misclassification across viewpoints. Exact ties resolve to the
//!   earliest label in the group's configured order.
//! - **Parts**: each part label is counted per image, and the largest count
//!   seen in any single image is recorded. Counts are never summed across
//!   images, since the same window shows up in several photos of the same wall.
//!
//! Both passes merge into the existing metadata bag: new keys are added and
//! matching keys overwritten, while unrelated import-time attributes survive.
//! A group with no linked detections writes nothing, preserving any
//! pre-existing value.

use itertools::Itertools;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::buildings::{Building, BuildingStore};
use crate::constants::Confidence;
use crate::detections::DetectionSet;
use crate::sightline::{PropertyGroup, Sightline};

/// Consolidate property detections into one winning label per group.
///
/// Arguments
/// -----------------
/// * `building`: the building whose linked detections are folded.
/// * `detections`: the detection set the building's links point into.
/// * `property_groups`: ordered groups; label order breaks exact ties.
/// * `prefix`: prepended to every written metadata key.
///
/// Return
/// ----------
/// * Metadata updates, one entry per group with a strictly positive
///   confidence sum.
pub fn consolidated_properties(
    building: &Building,
    detections: &DetectionSet,
    property_groups: &[PropertyGroup],
    prefix: &str,
) -> Map<String, Value> {
    let mut cumulative_conf: HashMap<&str, Confidence> = HashMap::new();
    for &detection_id in &building.detections {
        if let Some(detection) = detections.get(detection_id) {
            *cumulative_conf.entry(detection.class_str.as_str()).or_insert(0.0) +=
                detection.confidence;
        }
    }

    let mut updates = Map::new();
    for group in property_groups {
        let mut winner: Option<(&str, Confidence)> = None;
        for label in &group.labels {
            let conf = cumulative_conf.get(label.as_str()).copied().unwrap_or(0.0);
            match winner {
                Some((_, best)) if conf <= best => {}
                _ if conf > 0.0 => winner = Some((label, conf)),
                _ => {}
            }
        }
        if let Some((label, _)) = winner {
            updates.insert(
                format!("{prefix}{}", group.name),
                Value::String(label.to_string()),
            );
        }
    }
    updates
}

/// Consolidate part detections into one per-image-maximum count per part.
///
/// Arguments
/// -----------------
/// * `building`: the building whose linked detections are folded.
/// * `detections`: the detection set the building's links point into.
/// * `part_names`: part labels to count.
/// * `prefix`: prepended to every written metadata key.
///
/// Return
/// ----------
/// * Metadata updates, one entry per part seen in at least one image: the
///   most instances of that part ever seen in a single photo.
pub fn consolidated_parts(
    building: &Building,
    detections: &DetectionSet,
    part_names: &[String],
    prefix: &str,
) -> Map<String, Value> {
    let parts_image_ids = building
        .detections
        .iter()
        .filter_map(|&id| detections.get(id))
        .filter(|det| part_names.iter().any(|part| part == &det.class_str))
        .map(|det| (det.class_str.as_str(), det.image))
        .into_group_map();

    let mut updates = Map::new();
    for part_name in part_names {
        if let Some(image_ids) = parts_image_ids.get(part_name.as_str()) {
            let max_per_image = image_ids
                .iter()
                .counts()
                .into_values()
                .max()
                .unwrap_or(0);
            updates.insert(
                format!("{prefix}{part_name}"),
                Value::from(max_per_image as u64),
            );
        }
    }
    updates
}

/// Merge consolidation updates into a building's metadata bag: new keys are
/// added, matching keys overwritten, everything else left untouched.
pub fn apply_updates(building: &mut Building, updates: Map<String, Value>) {
    for (key, value) in updates {
        building.metadata.insert(key, value);
    }
}

/// Run both consolidation passes for one building.
pub fn consolidate_building(
    building: &mut Building,
    detections: &DetectionSet,
    config: &Sightline,
) {
    let parts = consolidated_parts(
        building,
        detections,
        &config.part_names,
        &config.metadata_prefix,
    );
    apply_updates(building, parts);

    let properties = consolidated_properties(
        building,
        detections,
        &config.property_groups,
        &config.metadata_prefix,
    );
    apply_updates(building, properties);
}

/// Consolidate every building in the store, in parallel.
///
/// Each building's metadata is touched exactly once, so buildings partition
/// cleanly across workers with no contention.
pub fn consolidate_store(store: &mut BuildingStore, detections: &DetectionSet, config: &Sightline) {
    store
        .buildings_mut()
        .par_iter_mut()
        .for_each(|building| consolidate_building(building, detections, config));
}
