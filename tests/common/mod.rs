use std::collections::HashMap;

use geo::{polygon, Polygon};
use sightline::ingest::DetectionBatch;
use sightline::{Image, PropertyGroup, Sightline};

/// Vehicle position shared by all fixture images.
pub const CAR_LON: f64 = 100.37766844977699;
pub const CAR_LAT: f64 = -0.937739981443431;

pub fn square_around(lon: f64, lat: f64, half_deg: f64) -> Polygon<f64> {
    polygon![
        (x: lon - half_deg, y: lat - half_deg),
        (x: lon + half_deg, y: lat - half_deg),
        (x: lon + half_deg, y: lat + half_deg),
        (x: lon - half_deg, y: lat + half_deg),
        (x: lon - half_deg, y: lat - half_deg),
    ]
}

/// Run configuration with one property group (material: brick before wood)
/// and two part labels (window, door).
pub fn test_config() -> Sightline {
    let parts_map = HashMap::from([(1, "window".to_string()), (2, "door".to_string())]);
    let properties_map = HashMap::from([(1, "brick".to_string()), (2, "wood".to_string())]);
    let property_groups = vec![PropertyGroup {
        name: "material".to_string(),
        labels: vec!["brick".to_string(), "wood".to_string()],
    }];
    let part_names = vec!["window".to_string(), "door".to_string()];
    Sightline::new(parts_map, properties_map, property_groups, part_names)
}

pub fn pose_image(frame: &str, heading: f64, cam: u8) -> Image {
    Image {
        lon: CAR_LON,
        lat: CAR_LAT,
        heading,
        neighborhood: "padang".to_string(),
        subfolder: "PADANG_01".to_string(),
        frame: frame.to_string(),
        image_fname: format!("{frame}_Cam{cam}.jpg"),
        cam,
    }
}

/// Detection batch referencing a fixture image, every box centered
/// horizontally so its bearing lands on the camera axis.
pub fn centered_batch(frame: &str, cam: u8, classes: Vec<i64>, scores: Vec<f64>) -> DetectionBatch {
    let boxes = classes.iter().map(|_| [0.4, 0.2, 0.6, 0.8]).collect();
    DetectionBatch {
        neighborhood: "padang".to_string(),
        subfolder: "PADANG_01".to_string(),
        frame: frame.to_string(),
        image_fname: format!("{frame}_Cam{cam}.jpg"),
        cam,
        detection_boxes: boxes,
        detection_classes: classes,
        detection_scores: scores,
    }
}
