//! # GeoJSON interchange
//!
//! Serializes consolidated building metadata and detection geometry to GeoJSON
//! FeatureCollections for downstream consumers, and parses footprint features
//! back into `geo` polygons for ingest. Documents are plain
//! [`serde_json::Value`] trees in the `urn:ogc:def:crs:OGC:1.3:CRS84`
//! convention (lon/lat order), matching what the rest of the toolchain
//! produces and expects.

use std::collections::HashSet;

use geo::{Coord, LineString, Polygon};
use serde_json::{json, Value};

use crate::buildings::BuildingStore;
use crate::detections::DetectionSet;
use crate::images::ImageSet;

/// Serialize a polygon into a GeoJSON `Polygon` geometry value.
pub fn polygon_to_geojson(polygon: &Polygon<f64>) -> Value {
    let ring_coords = |ring: &LineString<f64>| -> Vec<Value> {
        ring.coords().map(|c| json!([c.x, c.y])).collect()
    };

    let mut rings = vec![Value::Array(ring_coords(polygon.exterior()))];
    rings.extend(
        polygon
            .interiors()
            .iter()
            .map(|ring| Value::Array(ring_coords(ring))),
    );
    json!({ "type": "Polygon", "coordinates": rings })
}

/// Serialize a linestring into a GeoJSON `LineString` geometry value.
pub fn linestring_to_geojson(line: &LineString<f64>) -> Value {
    let coords: Vec<Value> = line.coords().map(|c| json!([c.x, c.y])).collect();
    json!({ "type": "LineString", "coordinates": coords })
}

fn parse_ring(value: &Value) -> Option<LineString<f64>> {
    let coords: Option<Vec<Coord<f64>>> = value.as_array()?.iter().map(parse_position).collect();
    Some(LineString::from(coords?))
}

fn parse_position(value: &Value) -> Option<Coord<f64>> {
    let pair = value.as_array()?;
    Some(Coord {
        x: pair.first()?.as_f64()?,
        y: pair.get(1)?.as_f64()?,
    })
}

/// Parse a GeoJSON `Polygon` geometry value into a `geo` polygon.
///
/// Returns `None` for non-polygon geometries or malformed coordinate arrays;
/// callers treat that as a skippable record, not a batch failure.
pub fn polygon_from_geojson(geometry: &Value) -> Option<Polygon<f64>> {
    if geometry.get("type")?.as_str()? != "Polygon" {
        return None;
    }
    let rings = geometry.get("coordinates")?.as_array()?;
    let mut parsed = rings.iter().map(parse_ring);
    let exterior = parsed.next()??;
    let interiors: Option<Vec<LineString<f64>>> = parsed.collect();
    Some(Polygon::new(exterior, interiors?))
}

/// Export building footprints and consolidated metadata as a FeatureCollection.
///
/// Arguments
/// -----------------
/// * `store`: the building store after consolidation.
/// * `neighborhood`: restrict the export to one neighborhood when set.
/// * `name`: FeatureCollection name.
///
/// Return
/// ----------
/// * A GeoJSON document; each feature carries the building's metadata plus
///   its id, neighborhood and linked detection count as properties.
pub fn buildings_to_geojson(
    store: &BuildingStore,
    neighborhood: Option<&str>,
    name: &str,
) -> Value {
    let features: Vec<Value> = store
        .iter()
        .filter(|(_, building)| neighborhood.is_none_or(|n| building.neighborhood == n))
        .map(|(id, building)| {
            let mut properties = building.metadata.clone();
            properties.insert("building_id".to_string(), Value::from(id as u64));
            properties.insert(
                "neighborhood".to_string(),
                Value::from(building.neighborhood.clone()),
            );
            properties.insert(
                "n_detections".to_string(),
                Value::from(building.detections.len() as u64),
            );
            json!({
                "type": "Feature",
                "geometry": polygon_to_geojson(&building.footprint),
                "properties": Value::Object(properties),
            })
        })
        .collect();

    feature_collection(name, features)
}

/// Filters applied to the ray export.
#[derive(Debug, Clone, Default)]
pub struct RayExportOptions {
    /// Restrict to one neighborhood.
    pub neighborhood: Option<String>,
    /// Restrict to these class labels.
    pub class_filter: Option<HashSet<String>>,
    /// Drop detections that were never linked to a building.
    pub linked_only: bool,
    /// Prefix image paths with this bucket URL.
    pub bucket_path: Option<String>,
}

/// Export detection rays as a FeatureCollection of linestrings.
///
/// Arguments
/// -----------------
/// * `detections`: ray-built (and optionally linked) detections.
/// * `images`: pose table, used to resolve source image paths.
/// * `name`: FeatureCollection name.
/// * `options`: neighborhood/class/linked-only filters and bucket rewriting.
pub fn rays_to_geojson(
    detections: &DetectionSet,
    images: &ImageSet,
    name: &str,
    options: &RayExportOptions,
) -> Value {
    let bucket = options
        .bucket_path
        .as_deref()
        .map(|b| b.trim_end_matches('/'));

    let features: Vec<Value> = detections
        .iter()
        .filter(|(_, det)| {
            options
                .neighborhood
                .as_deref()
                .is_none_or(|n| det.neighborhood == n)
        })
        .filter(|(_, det)| {
            options
                .class_filter
                .as_ref()
                .is_none_or(|f| f.contains(&det.class_str))
        })
        .filter(|(_, det)| !options.linked_only || det.building.is_some())
        .map(|(_, det)| {
            let image_path = images.get(det.image).map(|image| {
                match bucket {
                    Some(bucket) => format!("{bucket}/{}", image.path()),
                    None => image.path(),
                }
            });
            json!({
                "type": "Feature",
                "geometry": linestring_to_geojson(&det.ray),
                "properties": {
                    "class_str": det.class_str,
                    "confidence": det.confidence,
                    "image_id": det.image,
                    "image_path": image_path,
                    "building_id": det.building,
                },
            })
        })
        .collect();

    feature_collection(name, features)
}

fn feature_collection(name: &str, features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "name": name,
        "crs": {
            "type": "name",
            "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" },
        },
        "features": features,
    })
}
