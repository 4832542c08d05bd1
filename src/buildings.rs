//! # Building store
//!
//! Holds building footprints with their accumulated metadata and answers the
//! spatial queries of the matcher. Each [`Building`] owns a footprint polygon
//! (WGS84), a centroid cached at insertion time, a mutable metadata bag, and
//! the ordered list of detections linked to it.
//!
//! Candidate lookup is backed by one R-tree per neighborhood, keyed by the
//! footprint bounding box, so per-detection matching stays sub-linear in the
//! building count. A candidate must satisfy **both** query conditions:
//! centroid inside the detection's buffered search area **and** footprint
//! intersecting the detection ray; centroid containment alone is too
//! permissive across adjacent parcels, ray intersection alone too permissive
//! along oblique rays.

use std::collections::HashMap;

use geo::{BoundingRect, Centroid, Contains, Intersects, Line, LineString, Point, Polygon};
use log::warn;
use rstar::{RTree, RTreeObject, AABB};
use serde_json::{Map, Value};

use crate::constants::{BuildingId, DetectionId};
use crate::geodesy::validate_lonlat;

/// Geometry and accumulated metadata for a single building.
///
/// # Fields
///
/// * `footprint` - Building outline polygon (WGS84)
/// * `centroid` - Cached centroid of the footprint, recomputed only when the
///   footprint itself changes (it never does after ingest)
/// * `neighborhood` - Neighborhood the building belongs to
/// * `metadata` - Key/value bag: import-time attributes plus consolidated
///   detection-derived values
/// * `detections` - Ids of the detections linked to this building, in link order
#[derive(Debug, Clone)]
pub struct Building {
    pub footprint: Polygon<f64>,
    pub centroid: Point<f64>,
    pub neighborhood: String,
    pub metadata: Map<String, Value>,
    pub detections: Vec<DetectionId>,
}

/// R-tree entry: one footprint's bounding box with its building id.
#[derive(Debug, Clone)]
struct FootprintEnvelope {
    id: BuildingId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for FootprintEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Exterior-ring self-intersection test.
///
/// Checks every non-adjacent segment pair of the ring. Quadratic in the vertex
/// count, which is acceptable for footprint-sized rings at ingest time.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let segments: Vec<Line<f64>> = ring.lines().collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            // Adjacent segments share one endpoint; the closing segment is
            // adjacent to the first one as well.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}

/// Validate a footprint polygon: enough vertices, in-range coordinates, and a
/// simple (non-self-intersecting) exterior ring.
fn footprint_is_valid(footprint: &Polygon<f64>) -> bool {
    let exterior = footprint.exterior();
    if exterior.coords().count() < 4 {
        return false;
    }
    if exterior
        .coords()
        .any(|c| validate_lonlat(c.x, c.y).is_err())
    {
        return false;
    }
    !ring_self_intersects(exterior)
}

/// In-memory store of building footprints with per-neighborhood spatial indexes.
#[derive(Debug, Default)]
pub struct BuildingStore {
    buildings: Vec<Building>,
    index: HashMap<String, RTree<FootprintEnvelope>>,
    index_dirty: bool,
}

impl BuildingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one building footprint.
    ///
    /// Invalid geometries (too few vertices, out-of-range coordinates,
    /// self-intersecting ring, undefined centroid) are skipped with a warning
    /// and `None` is returned, never fatal for the batch.
    ///
    /// Arguments
    /// -----------------
    /// * `footprint`: outline polygon in WGS84 degrees.
    /// * `neighborhood`: neighborhood label used to scope candidate queries.
    /// * `extra_properties`: import-time attributes seeded into the metadata bag.
    ///
    /// Return
    /// ----------
    /// * The id of the stored building, or `None` if it was skipped.
    pub fn add_building(
        &mut self,
        footprint: Polygon<f64>,
        neighborhood: &str,
        extra_properties: Map<String, Value>,
    ) -> Option<BuildingId> {
        if !footprint_is_valid(&footprint) {
            warn!("skipping invalid footprint in neighborhood {neighborhood}");
            return None;
        }
        let Some(centroid) = footprint.centroid() else {
            warn!("skipping footprint with undefined centroid in neighborhood {neighborhood}");
            return None;
        };

        let id = self.buildings.len();
        self.buildings.push(Building {
            footprint,
            centroid,
            neighborhood: neighborhood.to_string(),
            metadata: extra_properties,
            detections: Vec::new(),
        });
        self.index_dirty = true;
        Some(id)
    }

    /// Rebuild the per-neighborhood R-trees after a batch of inserts.
    ///
    /// Queries require the index to be current; the pipeline calls this once
    /// between the ingest and matching stages.
    pub fn rebuild_index(&mut self) {
        let mut per_neighborhood: HashMap<String, Vec<FootprintEnvelope>> = HashMap::new();
        for (id, building) in self.buildings.iter().enumerate() {
            let Some(rect) = building.footprint.bounding_rect() else {
                continue;
            };
            per_neighborhood
                .entry(building.neighborhood.clone())
                .or_default()
                .push(FootprintEnvelope {
                    id,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                });
        }

        self.index = per_neighborhood
            .into_iter()
            .map(|(neighborhood, envelopes)| (neighborhood, RTree::bulk_load(envelopes)))
            .collect();
        self.index_dirty = false;
    }

    /// Whether [`rebuild_index`](Self::rebuild_index) must run before querying.
    pub fn index_dirty(&self) -> bool {
        self.index_dirty
    }

    /// Find candidate buildings for one detection.
    ///
    /// Returns the ids of buildings in `neighborhood` whose centroid lies
    /// inside `search_area` **and** whose footprint intersects `ray`, in
    /// insertion order (the stable order required for deterministic
    /// tie-breaking downstream).
    pub fn query_candidates(
        &self,
        neighborhood: &str,
        search_area: &Polygon<f64>,
        ray: &LineString<f64>,
    ) -> Vec<BuildingId> {
        debug_assert!(!self.index_dirty, "query_candidates on a stale index");

        let Some(tree) = self.index.get(neighborhood) else {
            return Vec::new();
        };
        let Some(rect) = search_area.bounding_rect() else {
            return Vec::new();
        };
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut candidates: Vec<BuildingId> = tree
            .locate_in_envelope_intersecting(&query)
            .filter(|envelope| {
                let building = &self.buildings[envelope.id];
                search_area.contains(&building.centroid) && building.footprint.intersects(ray)
            })
            .map(|envelope| envelope.id)
            .collect();
        candidates.sort_unstable();
        candidates
    }

    /// Append a detection to a building's linked list. Idempotent when the
    /// detection is already linked.
    pub fn link(&mut self, building: BuildingId, detection: DetectionId) {
        let Some(entry) = self.buildings.get_mut(building) else {
            return;
        };
        if !entry.detections.contains(&detection) {
            entry.detections.push(detection);
        }
    }

    pub fn get(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn get_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingId, &Building)> {
        self.buildings.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BuildingId, &mut Building)> {
        self.buildings.iter_mut().enumerate()
    }

    /// Mutable view of all buildings, for parallel consolidation.
    pub fn buildings_mut(&mut self) -> &mut [Building] {
        &mut self.buildings
    }
}

#[cfg(test)]
mod buildings_test {
    use super::*;
    use geo::polygon;

    fn square_around(lon: f64, lat: f64, half_deg: f64) -> Polygon<f64> {
        polygon![
            (x: lon - half_deg, y: lat - half_deg),
            (x: lon + half_deg, y: lat - half_deg),
            (x: lon + half_deg, y: lat + half_deg),
            (x: lon - half_deg, y: lat + half_deg),
            (x: lon - half_deg, y: lat - half_deg),
        ]
    }

    #[test]
    fn test_add_building_caches_centroid() {
        let mut store = BuildingStore::new();
        let id = store
            .add_building(square_around(100.0, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        let building = store.get(id).unwrap();
        assert!((building.centroid.x() - 100.0).abs() < 1e-9);
        assert!((building.centroid.y() - -0.9).abs() < 1e-9);
    }

    #[test]
    fn test_self_intersecting_footprint_is_skipped() {
        let mut store = BuildingStore::new();
        // Bowtie polygon
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        assert_eq!(store.add_building(bowtie, "padang", Map::new()), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_out_of_range_footprint_is_skipped() {
        let mut store = BuildingStore::new();
        assert_eq!(
            store.add_building(square_around(200.0, -0.9, 0.0001), "padang", Map::new()),
            None
        );
    }

    #[test]
    fn test_query_requires_both_conditions() {
        let mut store = BuildingStore::new();
        let hit = store
            .add_building(square_around(100.0, -0.9, 0.00005), "padang", Map::new())
            .unwrap();
        // Centroid inside the search area, but the ray misses the footprint
        let off_ray = store
            .add_building(square_around(100.0001, -0.9003, 0.00001), "padang", Map::new())
            .unwrap();
        // Footprint crossed by the ray, but centroid outside the search area
        let off_buffer = store
            .add_building(square_around(99.99955, -0.9, 0.00005), "padang", Map::new())
            .unwrap();
        // Intersecting footprint in another neighborhood
        store
            .add_building(square_around(100.0, -0.9, 0.00005), "jakarta", Map::new())
            .unwrap();
        store.rebuild_index();

        let ray = LineString::from(vec![(99.9995, -0.9), (100.0, -0.9)]);
        // Covers the hit and off-ray centroids but not the off-buffer one
        let search_area = square_around(100.0, -0.9002, 0.0004);

        let candidates = store.query_candidates("padang", &search_area, &ray);
        assert_eq!(candidates, vec![hit]);
        assert!(!candidates.contains(&off_ray));
        assert!(!candidates.contains(&off_buffer));
    }

    #[test]
    fn test_query_unknown_neighborhood_is_empty() {
        let mut store = BuildingStore::new();
        store.add_building(square_around(100.0, -0.9, 0.0001), "padang", Map::new());
        store.rebuild_index();
        let ray = LineString::from(vec![(99.9995, -0.9), (100.0005, -0.9)]);
        assert!(store
            .query_candidates("bandung", &square_around(100.0, -0.9, 0.001), &ray)
            .is_empty());
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut store = BuildingStore::new();
        let id = store
            .add_building(square_around(100.0, -0.9, 0.0001), "padang", Map::new())
            .unwrap();
        store.link(id, 7);
        store.link(id, 7);
        store.link(id, 3);
        assert_eq!(store.get(id).unwrap().detections, vec![7, 3]);
    }
}
