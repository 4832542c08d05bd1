//! # Pipeline orchestration
//!
//! Runs the three triangulation stages in order with a barrier between each:
//!
//! 1. **Ray building**: detection batches to geolocated rays, in parallel
//!    across batches.
//! 2. **Matching**: rays to buildings, candidate resolution in parallel,
//!    links applied sequentially in detection order.
//! 3. **Consolidation**: linked detections folded into building metadata, in
//!    parallel across buildings.
//!
//! Stages are idempotent, so an aborted run is restarted from the last
//! completed stage by re-running it. The stage outputs and every skip record
//! are folded into a [`RunSummary`] logged at the end of the run.

use crate::buildings::BuildingStore;
use crate::consolidate::consolidate_store;
use crate::detections::DetectionSet;
use crate::images::ImageSet;
use crate::ingest::DetectionBatch;
use crate::matcher::link_detections;
use crate::ray::build_rays;
use crate::report::{MatchStats, RunSummary, SkipRecord};
use crate::sightline::Sightline;
use crate::sightline_errors::SightlineError;

/// Result of a full triangulation run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// All ray-built detections, linked where a building matched.
    pub detections: DetectionSet,
    /// Matcher counters.
    pub stats: MatchStats,
    /// Run-end summary, already logged.
    pub summary: RunSummary,
}

/// Execute ray building, matching, and consolidation over pre-ingested inputs.
///
/// Part and property batches are ray-built with their respective class maps,
/// exactly as the two inference files of a collection run are. The store's
/// spatial index is rebuilt between ingest and matching; consolidation only
/// starts once every detection of the run is linked.
///
/// Arguments
/// -----------------
/// * `config`: run configuration.
/// * `images`: ingested pose table.
/// * `store`: building store, mutated by linking and consolidation.
/// * `part_batches`: detector output for building parts.
/// * `property_batches`: detector output for building properties.
/// * `ingest_skips`: skip records carried over from the ingest stage, folded
///   into the summary.
///
/// Return
/// ----------
/// * The detections, matcher counters and run summary, or a batch-fatal error.
pub fn run(
    config: &Sightline,
    images: &ImageSet,
    store: &mut BuildingStore,
    part_batches: &[DetectionBatch],
    property_batches: &[DetectionBatch],
    ingest_skips: Vec<SkipRecord>,
) -> Result<PipelineOutput, SightlineError> {
    let mut skipped = ingest_skips;
    let mut detections = DetectionSet::new();

    skipped.extend(build_rays(
        config,
        images,
        part_batches,
        &config.parts_map,
        &mut detections,
    )?);
    skipped.extend(build_rays(
        config,
        images,
        property_batches,
        &config.properties_map,
        &mut detections,
    )?);

    // Barrier: matching needs a complete detection set and a current index
    store.rebuild_index();
    let stats = link_detections(store, &mut detections, images);

    // Barrier: consolidation needs all links for a building in place
    consolidate_store(store, &detections, config);

    let summary = RunSummary {
        n_buildings: store.len(),
        n_images: images.len(),
        n_detections: detections.len(),
        n_linked: stats.matched,
        n_missed: stats.missed,
        skipped,
    };
    summary.log();

    Ok(PipelineOutput {
        detections,
        stats,
        summary,
    })
}
