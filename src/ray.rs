//! # Detection ray builder
//!
//! Turns raw per-image detection batches into geolocated [`Detection`] records:
//! for each box, the owning image is resolved, the camera's visual extents are
//! derived from the vehicle heading, the box's horizontal midpoint is
//! interpolated to an absolute compass bearing, and a fixed-length ray plus a
//! rectangular buffered search extent are constructed from the image position.
//!
//! The stage is pure computation with no persistence side effects: the same
//! inputs always produce the same detection set, so a run can safely be
//! restarted from this stage. Batches referencing unknown images are recorded
//! in the skip report and dropped; an unknown class id aborts the whole batch
//! rather than risk silently mislabeling a detection.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::constants::ClassId;
use crate::detections::{BoundingBox, Detection, DetectionSet};
use crate::geodesy::{bounding_box_polygon, generate_ray, ray_buffer};
use crate::images::ImageSet;
use crate::ingest::DetectionBatch;
use crate::report::{SkipReason, SkipRecord};
use crate::sightline::Sightline;
use crate::sightline_errors::SightlineError;
use crate::visual::{interpolate, VisualExtents};

/// Build ray geometry for every detection of one batch.
///
/// Returns the ray-built detections of the batch plus the skip records for
/// anything dropped along the way. Batch-fatal conditions (unknown class id)
/// propagate as errors.
fn build_batch(
    config: &Sightline,
    images: &ImageSet,
    batch: &DetectionBatch,
    class_map: &HashMap<ClassId, String>,
) -> Result<(Vec<Detection>, Vec<SkipRecord>), SightlineError> {
    let mut detections = Vec::new();
    let mut skipped = Vec::new();

    if batch.detection_scores.is_empty() {
        return Ok((detections, skipped));
    }

    let Some(image_id) = images.find(
        &batch.subfolder,
        &batch.frame,
        &batch.image_fname,
        batch.cam,
    ) else {
        skipped.push(SkipRecord::new(
            SkipReason::MissingImage,
            format!(
                "No image found for filters: {}, {}, {}, {}, {}. \
                 Missing in image information/trajectory file?",
                batch.neighborhood, batch.subfolder, batch.frame, batch.image_fname, batch.cam
            ),
        ));
        return Ok((detections, skipped));
    };
    let image = images
        .get(image_id)
        .ok_or_else(|| SightlineError::EmptyGeometry(format!("image {image_id}")))?;

    let Some(&side) = config.camera_sides.get(&batch.cam) else {
        skipped.push(SkipRecord::new(
            SkipReason::UnmappedCamera,
            format!("camera index {} in {}", batch.cam, image.path()),
        ));
        return Ok((detections, skipped));
    };

    let vext = VisualExtents::from_heading(image.heading, config.fov);
    let (window_min, window_max) = vext.window(side);

    for ((score, class_id), box_values) in batch
        .detection_scores
        .iter()
        .zip(&batch.detection_classes)
        .zip(&batch.detection_boxes)
    {
        let class_str = class_map
            .get(class_id)
            .ok_or(SightlineError::UnknownClassId(*class_id))?;
        if !config.class_included(class_str) {
            continue;
        }

        let bbox = BoundingBox {
            x_min: box_values[0],
            y_min: box_values[1],
            x_max: box_values[2],
            y_max: box_values[3],
        };
        let mean_x = bbox.mean_x();
        if !(0.0..=1.0).contains(&mean_x) {
            skipped.push(SkipRecord::new(
                SkipReason::InvalidGeometry,
                format!("box midpoint {mean_x} outside [0, 1] in {}", image.path()),
            ));
            continue;
        }

        let angle = interpolate(mean_x, window_min, window_max)?;
        let ray = match generate_ray(image.lon, image.lat, angle, config.ray_length) {
            Ok(ray) => ray,
            Err(err) => {
                skipped.push(SkipRecord::new(
                    SkipReason::InvalidCoordinate,
                    format!("{err} in {}", image.path()),
                ));
                continue;
            }
        };
        let search_area = match ray_buffer(&ray, config.buffer_distance, config.simplify_tolerance)
            .and_then(|buffer| bounding_box_polygon(&buffer))
        {
            Ok(area) => area,
            // Valid WGS84 latitudes above the Mercator limit land here
            Err(err) => {
                skipped.push(SkipRecord::new(
                    SkipReason::InvalidCoordinate,
                    format!("{err} in {}", image.path()),
                ));
                continue;
            }
        };

        detections.push(Detection {
            image: image_id,
            bbox,
            class_id: *class_id,
            class_str: class_str.clone(),
            confidence: *score,
            neighborhood: image.neighborhood.clone(),
            angle,
            ray,
            search_area,
            building: None,
        });
    }

    Ok((detections, skipped))
}

/// Ray-build a slice of detection batches into `out`, in batch order.
///
/// Batches are processed in parallel; results are appended sequentially so the
/// resulting detection ids are deterministic across runs.
///
/// Arguments
/// -----------------
/// * `config`: run configuration (camera geometry, ray parameters, class filter).
/// * `images`: ingested pose table.
/// * `batches`: raw detection batches, one per image.
/// * `class_map`: class-id→label map for these batches (parts or properties).
/// * `out`: detection set receiving the ray-built detections.
///
/// Return
/// ----------
/// * Skip records for dropped batches/boxes, or a batch-fatal error.
pub fn build_rays(
    config: &Sightline,
    images: &ImageSet,
    batches: &[DetectionBatch],
    class_map: &HashMap<ClassId, String>,
    out: &mut DetectionSet,
) -> Result<Vec<SkipRecord>, SightlineError> {
    let built: Result<Vec<_>, SightlineError> = batches
        .par_iter()
        .map(|batch| build_batch(config, images, batch, class_map))
        .collect();

    let mut skipped = Vec::new();
    for (detections, batch_skips) in built? {
        for detection in detections {
            out.push(detection);
        }
        skipped.extend(batch_skips);
    }
    Ok(skipped)
}

#[cfg(test)]
mod ray_test {
    use super::*;
    use crate::geodesy::inverse_geodesic;
    use crate::images::Image;
    use crate::sightline::PropertyGroup;

    fn test_config() -> Sightline {
        let properties_map = HashMap::from([(1, "brick".to_string()), (2, "wood".to_string())]);
        Sightline::new(
            HashMap::new(),
            properties_map,
            vec![PropertyGroup {
                name: "material".to_string(),
                labels: vec!["brick".to_string(), "wood".to_string()],
            }],
            vec![],
        )
    }

    fn test_images() -> ImageSet {
        let mut images = ImageSet::new();
        images.add(Image {
            lon: 100.37766844977699,
            lat: -0.937739981443431,
            heading: 0.0,
            neighborhood: "padang".to_string(),
            subfolder: "PADANG_01".to_string(),
            frame: "frame_000000".to_string(),
            image_fname: "frame_000000_Cam1.jpg".to_string(),
            cam: 1,
        });
        images
    }

    fn test_batch(cam: u8) -> DetectionBatch {
        DetectionBatch {
            neighborhood: "padang".to_string(),
            subfolder: "PADANG_01".to_string(),
            frame: "frame_000000".to_string(),
            image_fname: format!("frame_000000_Cam{cam}.jpg"),
            cam,
            detection_boxes: vec![[0.4, 0.2, 0.6, 0.8]],
            detection_classes: vec![1],
            detection_scores: vec![0.9],
        }
    }

    #[test]
    fn test_build_rays_populates_geometry() {
        let config = test_config();
        let images = test_images();
        let mut out = DetectionSet::new();
        let skipped = build_rays(
            &config,
            &images,
            &[test_batch(1)],
            &config.properties_map,
            &mut out,
        )
        .unwrap();

        assert!(skipped.is_empty());
        assert_eq!(out.len(), 1);
        let det = out.get(0).unwrap();
        // Heading 0, right camera, centered box → bearing 90°
        assert!((det.angle - 90.0).abs() < 1e-9);
        assert_eq!(det.ray.0[0].x, 100.37766844977699);
        assert_eq!(det.ray.0[0].y, -0.937739981443431);
        let (_, length) =
            inverse_geodesic(det.ray.0[0].x, det.ray.0[0].y, det.ray.0[1].x, det.ray.0[1].y)
                .unwrap();
        assert!((length - config.ray_length).abs() < 0.01);
        assert_eq!(det.building, None);
    }

    #[test]
    fn test_missing_image_is_reported_not_fatal() {
        let config = test_config();
        let images = test_images();
        let mut batch = test_batch(1);
        batch.frame = "frame_999999".to_string();

        let mut out = DetectionSet::new();
        let skipped =
            build_rays(&config, &images, &[batch], &config.properties_map, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::MissingImage);
    }

    #[test]
    fn test_unmapped_camera_is_reported() {
        let config = test_config();
        let mut images = test_images();
        images.add(Image {
            cam: 2,
            image_fname: "frame_000000_Cam2.jpg".to_string(),
            ..images.get(0).unwrap().clone()
        });

        let mut out = DetectionSet::new();
        let skipped = build_rays(
            &config,
            &images,
            &[test_batch(2)],
            &config.properties_map,
            &mut out,
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(skipped[0].reason, SkipReason::UnmappedCamera);
    }

    #[test]
    fn test_latitude_above_projection_limit_is_skipped() {
        let config = test_config();
        let mut images = ImageSet::new();
        // Valid WGS84 position, but beyond the Web Mercator latitude limit
        images.add(Image {
            lon: 15.0,
            lat: 86.0,
            heading: 0.0,
            neighborhood: "svalbard".to_string(),
            subfolder: "SVALBARD_01".to_string(),
            frame: "frame_000000".to_string(),
            image_fname: "frame_000000_Cam1.jpg".to_string(),
            cam: 1,
        });
        let mut batch = test_batch(1);
        batch.neighborhood = "svalbard".to_string();
        batch.subfolder = "SVALBARD_01".to_string();

        let mut out = DetectionSet::new();
        let skipped =
            build_rays(&config, &images, &[batch], &config.properties_map, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::InvalidCoordinate);
    }

    #[test]
    fn test_unknown_class_id_aborts_the_batch() {
        let config = test_config();
        let images = test_images();
        let mut batch = test_batch(1);
        batch.detection_classes = vec![42];

        let mut out = DetectionSet::new();
        let result = build_rays(&config, &images, &[batch], &config.properties_map, &mut out);
        assert_eq!(result.unwrap_err(), SightlineError::UnknownClassId(42));
    }

    #[test]
    fn test_class_filter_drops_silently() {
        let config = test_config().with_class_filter(["wood".to_string()]);
        let images = test_images();
        let mut out = DetectionSet::new();
        let skipped = build_rays(
            &config,
            &images,
            &[test_batch(1)],
            &config.properties_map,
            &mut out,
        )
        .unwrap();
        assert!(out.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_build_rays_is_idempotent() {
        let config = test_config();
        let images = test_images();
        let batches = [test_batch(1)];

        let mut first = DetectionSet::new();
        let mut second = DetectionSet::new();
        build_rays(&config, &images, &batches, &config.properties_map, &mut first).unwrap();
        build_rays(&config, &images, &batches, &config.properties_map, &mut second).unwrap();

        assert_eq!(first.len(), second.len());
        let (a, b) = (first.get(0).unwrap(), second.get(0).unwrap());
        assert_eq!(a.angle, b.angle);
        assert_eq!(a.ray, b.ray);
        assert_eq!(a.search_area, b.search_area);
    }
}
