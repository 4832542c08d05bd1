//! # Input interchange readers
//!
//! Minimal readers for the three inputs the core consumes from its upstream
//! collaborators:
//!
//! 1. **Pose trajectory table**: CSV rows with the rig's bracketed headers
//!    (`heading[deg]`, `latitude[deg]`, `longitude[deg]`), one row per capture
//!    event, bulk-ingested into an [`ImageSet`].
//! 2. **Detection batches**: JSON array of per-image inference results
//!    (normalized boxes, class ids, confidence scores).
//! 3. **Building footprints**: GeoJSON FeatureCollection of polygons carrying
//!    a neighborhood attribute, loaded into a [`BuildingStore`].
//!
//! Plus the two consolidation configuration files: the property-group map and
//! the part-name list.
//!
//! An unreadable source is fatal to the run; a malformed row or invalid
//! feature is skipped and reported.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::buildings::BuildingStore;
use crate::constants::ClassId;
use crate::export::polygon_from_geojson;
use crate::images::{Image, ImageSet};
use crate::report::{SkipReason, SkipRecord};
use crate::sightline::PropertyGroup;
use crate::sightline_errors::SightlineError;

/// One row of the pose trajectory CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseRecord {
    #[serde(rename = "heading[deg]")]
    pub heading: f64,
    pub image_fname: String,
    pub frame: String,
    #[serde(rename = "latitude[deg]")]
    pub latitude: f64,
    #[serde(rename = "longitude[deg]")]
    pub longitude: f64,
    pub cam: u8,
    pub neighborhood: String,
    pub subfolder: String,
}

impl From<PoseRecord> for Image {
    fn from(row: PoseRecord) -> Self {
        Image {
            lon: row.longitude,
            lat: row.latitude,
            heading: row.heading,
            neighborhood: row.neighborhood,
            subfolder: row.subfolder,
            frame: row.frame,
            image_fname: row.image_fname,
            cam: row.cam,
        }
    }
}

/// All detections produced for one image by the detector.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionBatch {
    pub neighborhood: String,
    pub subfolder: String,
    pub frame: String,
    pub image_fname: String,
    pub cam: u8,
    /// Normalized box corners as `(x_min, y_min, x_max, y_max)` on [0, 1].
    pub detection_boxes: Vec<[f64; 4]>,
    pub detection_classes: Vec<ClassId>,
    pub detection_scores: Vec<f64>,
}

fn unreadable(path: &Path, detail: impl ToString) -> SightlineError {
    SightlineError::UnreadableSource {
        path: path.display().to_string(),
        detail: detail.to_string(),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, SightlineError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| unreadable(path, err))
}

/// Load the pose trajectory table into an image set.
///
/// Arguments
/// -----------------
/// * `path`: trajectory CSV file, comma-delimited with bracketed headers.
///
/// Return
/// ----------
/// * The ingested images plus skip records for malformed rows and
///   out-of-range coordinates, or a fatal error if the file cannot be read.
pub fn load_images(path: impl AsRef<Path>) -> Result<(ImageSet, Vec<SkipRecord>), SightlineError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_reader(open(path)?);

    let mut images = ImageSet::new();
    let mut skipped = Vec::new();
    for (row_index, row) in reader.deserialize::<PoseRecord>().enumerate() {
        match row {
            Ok(record) => {
                let identity = format!("{}/{}", record.subfolder, record.image_fname);
                if images.add(record.into()).is_none() {
                    skipped.push(SkipRecord::new(SkipReason::InvalidCoordinate, identity));
                }
            }
            Err(err) => {
                skipped.push(SkipRecord::new(
                    SkipReason::MalformedRow,
                    format!("row {}: {err}", row_index + 1),
                ));
            }
        }
    }
    Ok((images, skipped))
}

/// Read a JSON file containing an array of detection batches.
pub fn read_detection_batches(
    path: impl AsRef<Path>,
) -> Result<Vec<DetectionBatch>, SightlineError> {
    let path = path.as_ref();
    let batches: Vec<DetectionBatch> = serde_json::from_reader(open(path)?)?;
    Ok(batches)
}

/// Neighborhood attribute of a footprint feature.
///
/// Shapefile-derived sources truncate the field name to ten characters, so
/// both `neighborhood` and `neighborho` are accepted.
fn feature_neighborhood(properties: &Value) -> Option<&str> {
    properties
        .get("neighborhood")
        .or_else(|| properties.get("neighborho"))
        .and_then(Value::as_str)
}

/// Load building footprints from a GeoJSON FeatureCollection into the store.
///
/// Non-polygon or invalid geometries and features without a neighborhood
/// attribute are skipped with a report; every feature property is seeded into
/// the building's metadata bag.
///
/// Return
/// ----------
/// * The number of buildings added plus the skip records.
pub fn load_footprints(
    path: impl AsRef<Path>,
    store: &mut BuildingStore,
) -> Result<(usize, Vec<SkipRecord>), SightlineError> {
    let path = path.as_ref();
    let document: Value = serde_json::from_reader(open(path)?)?;
    let features = document
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| unreadable(path, "no `features` array in GeoJSON document"))?;

    let mut added = 0;
    let mut skipped = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        let properties = feature.get("properties").cloned().unwrap_or(Value::Null);

        let Some(neighborhood) = feature_neighborhood(&properties).map(str::to_string) else {
            skipped.push(SkipRecord::new(
                SkipReason::InvalidFootprint,
                format!("feature {index}: no neighborhood attribute"),
            ));
            continue;
        };
        let Some(footprint) = feature.get("geometry").and_then(polygon_from_geojson) else {
            skipped.push(SkipRecord::new(
                SkipReason::InvalidFootprint,
                format!("feature {index}: geometry is not a polygon"),
            ));
            continue;
        };

        let extra_properties = match properties {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        match store.add_building(footprint, &neighborhood, extra_properties) {
            Some(_) => added += 1,
            None => skipped.push(SkipRecord::new(
                SkipReason::InvalidFootprint,
                format!("feature {index}: rejected by the store"),
            )),
        }
    }
    Ok((added, skipped))
}

/// Read the property-group configuration: a JSON object mapping each group
/// name to its ordered label list.
///
/// Groups are returned sorted by name so the consolidation tie-break order is
/// stable whatever the storage backend emitted.
pub fn read_property_groups(
    path: impl AsRef<Path>,
) -> Result<Vec<PropertyGroup>, SightlineError> {
    let path = path.as_ref();
    let document: serde_json::Map<String, Value> = serde_json::from_reader(open(path)?)?;

    let mut groups = Vec::with_capacity(document.len());
    for (name, labels) in document {
        let labels: Vec<String> = labels
            .as_array()
            .ok_or_else(|| unreadable(path, format!("group `{name}` is not a label array")))?
            .iter()
            .filter_map(|label| label.as_str().map(str::to_string))
            .collect();
        groups.push(PropertyGroup { name, labels });
    }
    groups.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(groups)
}

/// Read the part-name list: a JSON object with the list under a `parts` key.
pub fn read_parts_list(path: impl AsRef<Path>) -> Result<Vec<String>, SightlineError> {
    let path = path.as_ref();
    let document: Value = serde_json::from_reader(open(path)?)?;
    let parts = document
        .get("parts")
        .and_then(Value::as_array)
        .ok_or_else(|| unreadable(path, "must point to json with `parts` key"))?;
    Ok(parts
        .iter()
        .filter_map(|part| part.as_str().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod ingest_test {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sightline_{}_{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_images_parses_bracketed_headers() {
        let csv = "heading[deg],image_fname,frame,latitude[deg],longitude[deg],cam,neighborhood,subfolder\n\
                   238.816,frame_000000_Cam1.jpg,frame_000000,-0.9377,100.3776,1,padang,PADANG_01\n\
                   bad,frame_000001_Cam1.jpg,frame_000001,-0.9377,100.3776,1,padang,PADANG_01\n";
        let path = temp_file("trajectory.csv", csv);

        let (images, skipped) = load_images(&path).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::MalformedRow);
        let image = images.get(0).unwrap();
        assert!((image.heading - 238.816).abs() < 1e-9);
        assert_eq!(image.cam, 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_images_missing_file_is_fatal() {
        let result = load_images("/nonexistent/trajectory.csv");
        assert!(matches!(
            result,
            Err(SightlineError::UnreadableSource { .. })
        ));
    }

    #[test]
    fn test_load_footprints_skips_non_polygons() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Polygon", "coordinates": [[
                        [100.0, -0.9], [100.001, -0.9], [100.001, -0.899],
                        [100.0, -0.899], [100.0, -0.9]
                    ]]},
                    "properties": { "neighborhood": "padang", "osm_id": 42 }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [100.0, -0.9] },
                    "properties": { "neighborhood": "padang" }
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": { "neighborho": "padang" }
                }
            ]
        }"#;
        let path = temp_file("footprints.geojson", geojson);

        let mut store = BuildingStore::new();
        let (added, skipped) = load_footprints(&path, &mut store).unwrap();
        assert_eq!(added, 1);
        assert_eq!(skipped.len(), 2);
        let building = store.get(0).unwrap();
        assert_eq!(building.neighborhood, "padang");
        assert_eq!(building.metadata.get("osm_id"), Some(&Value::from(42)));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_property_groups_sorted_by_name() {
        let json = r#"{ "material": ["brick", "wood"], "completeness": ["complete", "incomplete"] }"#;
        let path = temp_file("groups.json", json);

        let groups = read_property_groups(&path).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "completeness");
        assert_eq!(groups[1].name, "material");
        assert_eq!(groups[1].labels, vec!["brick", "wood"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_read_parts_list_requires_parts_key() {
        let path = temp_file("parts.json", r#"{ "parts": ["window", "door"] }"#);
        assert_eq!(read_parts_list(&path).unwrap(), vec!["window", "door"]);
        std::fs::remove_file(path).ok();

        let path = temp_file("parts_bad.json", r#"{ "nope": [] }"#);
        assert!(matches!(
            read_parts_list(&path),
            Err(SightlineError::UnreadableSource { .. })
        ));
        std::fs::remove_file(path).ok();
    }
}
