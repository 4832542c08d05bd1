//! # Skip reports and run statistics
//!
//! Stage functions return a success payload **and** a side list of
//! [`SkipRecord`]s instead of aborting on record-level problems; only
//! batch-fatal conditions propagate as errors. The pipeline folds the skip
//! lists and the matcher's [`MatchStats`] into one [`RunSummary`] reported at
//! the end of a run.

use std::collections::HashMap;

use itertools::Itertools;
use log::info;

/// Why one input record was skipped (fatal to the record, never to the batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// A detection batch referenced an image absent from the pose table.
    MissingImage,
    /// A coordinate fell outside the valid lon/lat range.
    InvalidCoordinate,
    /// A footprint was rejected (non-polygon, self-intersecting, degenerate).
    InvalidFootprint,
    /// A bounding box or derived geometry was unusable.
    InvalidGeometry,
    /// The record's camera index has no visual-side mapping.
    UnmappedCamera,
    /// An input row could not be parsed into a record.
    MalformedRow,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingImage => "missing image",
            SkipReason::InvalidCoordinate => "invalid coordinate",
            SkipReason::InvalidFootprint => "invalid footprint",
            SkipReason::InvalidGeometry => "invalid geometry",
            SkipReason::UnmappedCamera => "unmapped camera index",
            SkipReason::MalformedRow => "malformed row",
        }
    }
}

/// One skipped record, with enough identity to locate the source row.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipRecord {
    pub reason: SkipReason,
    pub detail: String,
}

impl SkipRecord {
    pub fn new(reason: SkipReason, detail: impl Into<String>) -> Self {
        SkipRecord {
            reason,
            detail: detail.into(),
        }
    }
}

/// Matcher outcome counters. A zero-candidate detection is an expected miss,
/// not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub matched: usize,
    pub missed: usize,
}

impl MatchStats {
    /// Percentage of detections linked to a building, or `None` when nothing
    /// was processed.
    pub fn percent_matched(&self) -> Option<f64> {
        let total = self.matched + self.missed;
        if total == 0 {
            return None;
        }
        Some(100.0 * self.matched as f64 / total as f64)
    }

    pub fn log(&self) {
        match self.percent_matched() {
            Some(pct) => info!(
                "Found building matches for {} detections ({pct:.2}%)",
                self.matched
            ),
            None => info!(
                "Found 0 building matches. Try checking the building footprint source for errors"
            ),
        }
    }
}

/// Run-end summary: loaded entity counts, link outcome, skipped records.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub n_buildings: usize,
    pub n_images: usize,
    pub n_detections: usize,
    pub n_linked: usize,
    pub n_missed: usize,
    pub skipped: Vec<SkipRecord>,
}

impl RunSummary {
    /// Skipped-record counts grouped by reason.
    pub fn skipped_by_reason(&self) -> HashMap<SkipReason, usize> {
        self.skipped.iter().map(|s| s.reason).counts()
    }

    pub fn log(&self) {
        info!(
            "run summary: {} buildings, {} images, {} detections ({} linked, {} missed)",
            self.n_buildings, self.n_images, self.n_detections, self.n_linked, self.n_missed
        );
        for (reason, count) in self
            .skipped_by_reason()
            .into_iter()
            .sorted_by_key(|(reason, _)| reason.as_str())
        {
            info!("  skipped {count} records: {}", reason.as_str());
        }
    }
}
