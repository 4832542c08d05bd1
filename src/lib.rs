//! # sightline
//!
//! Triangulates street-level object detections onto building footprints.
//! Per-image bounding boxes are converted into geolocated rays from the
//! vehicle position, matched against footprint polygons through a spatial
//! index, and the repeated noisy detections of one physical building are
//! consolidated into a single authoritative metadata record.
//!
//! The crate operates on in-memory stores and plain records; persistence and
//! model inference are external collaborators that feed it pose tables,
//! detection batches, and footprint collections, and consume its
//! building-indexed metadata and GeoJSON exports.

pub mod buildings;
pub mod consolidate;
pub mod constants;
pub mod detections;
pub mod export;
pub mod geodesy;
pub mod images;
pub mod ingest;
pub mod matcher;
pub mod pipeline;
pub mod ray;
pub mod report;
pub mod sightline;
pub mod sightline_errors;
pub mod visual;

pub use crate::buildings::{Building, BuildingStore};
pub use crate::detections::{BoundingBox, Detection, DetectionSet};
pub use crate::images::{Image, ImageSet};
pub use crate::report::{MatchStats, RunSummary};
pub use crate::sightline::{PropertyGroup, Sightline};
pub use crate::sightline_errors::SightlineError;
