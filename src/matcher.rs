//! # Ray-to-building matcher
//!
//! Spatial join between ray-built detections and the building store. For each
//! detection the candidate buildings of its neighborhood are queried
//! (centroid inside the buffered search extent AND footprint intersecting the
//! ray); a single candidate links directly, multiple candidates resolve to the
//! one whose centroid is nearest the image position in projected planar
//! meters, with exact-distance ties falling back to candidate insertion order.
//!
//! Candidate resolution is order-independent and runs in parallel; the links
//! themselves are applied sequentially in detection-id order so the building
//! detection lists come out identical across runs.

use rayon::prelude::*;

use crate::buildings::BuildingStore;
use crate::constants::BuildingId;
use crate::detections::{Detection, DetectionSet};
use crate::geodesy::projected_distance;
use crate::images::ImageSet;
use crate::report::MatchStats;

/// Pick the building a single detection should link to, if any.
///
/// Multi-candidate ties are resolved by strictly-smaller projected distance,
/// so the earliest candidate in insertion order wins an exact tie.
fn resolve_candidate(
    detection: &Detection,
    images: &ImageSet,
    store: &BuildingStore,
) -> Option<BuildingId> {
    let candidates = store.query_candidates(
        &detection.neighborhood,
        &detection.search_area,
        &detection.ray,
    );

    match candidates.as_slice() {
        [] => None,
        [single] => Some(*single),
        multiple => {
            let image = images.get(detection.image)?;
            let origin = geo::Point::new(image.lon, image.lat);

            let mut best: Option<(BuildingId, f64)> = None;
            for &candidate in multiple {
                let building = store.get(candidate)?;
                let distance = projected_distance(&origin, &building.centroid)
                    .unwrap_or(f64::INFINITY);
                match best {
                    Some((_, best_distance)) if distance >= best_distance => {}
                    _ => best = Some((candidate, distance)),
                }
            }
            best.map(|(id, _)| id)
        }
    }
}

/// Link every ray-built detection to its building, mutating both sides of the
/// relationship.
///
/// A stale spatial index (buildings added since the last
/// [`BuildingStore::rebuild_index`]) is rebuilt here before querying, so
/// candidates are never resolved against a partial index. Re-running over the
/// same inputs is safe: the per-detection link is overwritten with the same
/// value and [`BuildingStore::link`] is idempotent.
///
/// Return
/// ----------
/// * Matched/missed counters for the run-end report.
pub fn link_detections(
    store: &mut BuildingStore,
    detections: &mut DetectionSet,
    images: &ImageSet,
) -> MatchStats {
    if store.index_dirty() {
        store.rebuild_index();
    }

    let assignments: Vec<Option<BuildingId>> = {
        let store_ref = &*store;
        detections
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(_, detection)| resolve_candidate(detection, images, store_ref))
            .collect()
    };

    let mut stats = MatchStats::default();
    for (detection_id, assignment) in assignments.into_iter().enumerate() {
        match assignment {
            Some(building_id) => {
                if let Some(detection) = detections.get_mut(detection_id) {
                    detection.building = Some(building_id);
                }
                store.link(building_id, detection_id);
                stats.matched += 1;
            }
            None => stats.missed += 1,
        }
    }
    stats.log();
    stats
}

#[cfg(test)]
mod matcher_test {
    use super::*;
    use crate::detections::BoundingBox;
    use crate::geodesy::{generate_ray, point_buffer};
    use geo::{polygon, Polygon};
    use serde_json::Map;

    fn square_around(lon: f64, lat: f64, half_deg: f64) -> Polygon<f64> {
        polygon![
            (x: lon - half_deg, y: lat - half_deg),
            (x: lon + half_deg, y: lat - half_deg),
            (x: lon + half_deg, y: lat + half_deg),
            (x: lon - half_deg, y: lat + half_deg),
            (x: lon - half_deg, y: lat - half_deg),
        ]
    }

    fn test_image_set() -> ImageSet {
        let mut images = ImageSet::new();
        images.add(crate::images::Image {
            lon: 100.0,
            lat: -0.9,
            heading: 0.0,
            neighborhood: "padang".to_string(),
            subfolder: "PADANG_01".to_string(),
            frame: "frame_000000".to_string(),
            image_fname: "frame_000000_Cam1.jpg".to_string(),
            cam: 1,
        });
        images
    }

    /// Detection shooting due east from (100, -0.9) with a generous search area.
    fn eastward_detection() -> Detection {
        let ray = generate_ray(100.0, -0.9, 90.0, 100.0).unwrap();
        let search_area = square_around(100.0005, -0.9, 0.002);
        Detection {
            image: 0,
            bbox: BoundingBox {
                x_min: 0.4,
                y_min: 0.2,
                x_max: 0.6,
                y_max: 0.8,
            },
            class_id: 1,
            class_str: "brick".to_string(),
            confidence: 0.9,
            neighborhood: "padang".to_string(),
            angle: 90.0,
            ray,
            search_area,
            building: None,
        }
    }

    #[test]
    fn test_single_candidate_links() {
        let mut store = BuildingStore::new();
        let building = store
            .add_building(square_around(100.0003, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        store.rebuild_index();

        let images = test_image_set();
        let mut detections = DetectionSet::new();
        let id = detections.push(eastward_detection());

        let stats = link_detections(&mut store, &mut detections, &images);
        assert_eq!(stats, MatchStats { matched: 1, missed: 0 });
        assert_eq!(detections.get(id).unwrap().building, Some(building));
        assert_eq!(store.get(building).unwrap().detections, vec![id]);
    }

    #[test]
    fn test_no_candidate_counts_a_miss() {
        let mut store = BuildingStore::new();
        // Building far north of the ray
        store
            .add_building(square_around(100.0, -0.5, 0.0001), "padang", Map::new())
            .unwrap();
        store.rebuild_index();

        let images = test_image_set();
        let mut detections = DetectionSet::new();
        let id = detections.push(eastward_detection());

        let stats = link_detections(&mut store, &mut detections, &images);
        assert_eq!(stats, MatchStats { matched: 0, missed: 1 });
        assert_eq!(detections.get(id).unwrap().building, None);
    }

    #[test]
    fn test_multi_candidate_picks_nearest_centroid() {
        let images = test_image_set();

        // Two buildings on the ray, the nearer one second in insertion order,
        // then again with the order swapped: the winner must not change.
        for swap in [false, true] {
            let mut store = BuildingStore::new();
            let near_footprint = square_around(100.0002, -0.9, 0.00005);
            let far_footprint = square_around(100.0006, -0.9, 0.00005);

            let (far, near) = if swap {
                let near = store
                    .add_building(near_footprint.clone(), "padang", Map::new())
                    .unwrap();
                let far = store
                    .add_building(far_footprint.clone(), "padang", Map::new())
                    .unwrap();
                (far, near)
            } else {
                let far = store
                    .add_building(far_footprint.clone(), "padang", Map::new())
                    .unwrap();
                let near = store
                    .add_building(near_footprint.clone(), "padang", Map::new())
                    .unwrap();
                (far, near)
            };
            store.rebuild_index();

            let mut detections = DetectionSet::new();
            let id = detections.push(eastward_detection());
            let stats = link_detections(&mut store, &mut detections, &images);

            assert_eq!(stats.matched, 1);
            assert_eq!(detections.get(id).unwrap().building, Some(near));
            assert!(store.get(far).unwrap().detections.is_empty());
        }
    }

    #[test]
    fn test_stale_index_is_rebuilt_before_querying() {
        let mut store = BuildingStore::new();
        let building = store
            .add_building(square_around(100.0003, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        // No rebuild_index between insert and linking
        assert!(store.index_dirty());

        let images = test_image_set();
        let mut detections = DetectionSet::new();
        let id = detections.push(eastward_detection());

        let stats = link_detections(&mut store, &mut detections, &images);
        assert_eq!(stats, MatchStats { matched: 1, missed: 0 });
        assert_eq!(detections.get(id).unwrap().building, Some(building));
        assert!(!store.index_dirty());
    }

    #[test]
    fn test_relink_is_idempotent() {
        let mut store = BuildingStore::new();
        let building = store
            .add_building(square_around(100.0003, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        store.rebuild_index();

        let images = test_image_set();
        let mut detections = DetectionSet::new();
        let id = detections.push(eastward_detection());

        let first = link_detections(&mut store, &mut detections, &images);
        let second = link_detections(&mut store, &mut detections, &images);
        assert_eq!(first, second);
        assert_eq!(store.get(building).unwrap().detections, vec![id]);
    }

    #[test]
    fn test_point_buffer_search_area_also_matches() {
        // A detection whose search area is a buffered point still resolves
        let mut store = BuildingStore::new();
        let building = store
            .add_building(square_around(100.0003, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        store.rebuild_index();

        let images = test_image_set();
        let mut detection = eastward_detection();
        detection.search_area = point_buffer(100.0, -0.9, 100.0, 0.5).unwrap();
        let mut detections = DetectionSet::new();
        detections.push(detection);

        let stats = link_detections(&mut store, &mut detections, &images);
        assert_eq!(stats.matched, 1);
        assert_eq!(store.get(building).unwrap().detections.len(), 1);
    }
}
