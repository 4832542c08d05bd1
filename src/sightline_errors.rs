use thiserror::Error;

/// Crate-wide error type for the triangulation pipeline.
///
/// Variants fall into three families, matching how the pipeline reacts to them:
///
/// - **Record-level data errors** (`InvalidCoordinate`, `EmptyGeometry`): the
///   offending record is skipped and reported, the batch continues.
/// - **Caller errors** (`InterpolationOutOfRange`): a bug in the calling
///   code, not in the input data.
/// - **Batch-fatal errors** (`UnknownClassId`, the wrapped io/csv/json
///   errors): the run cannot proceed without risking silent mislabeling, so
///   it aborts.
#[derive(Error, Debug)]
pub enum SightlineError {
    #[error("Coordinate outside valid lon/lat range: ({0}, {1})")]
    InvalidCoordinate(f64, f64),

    #[error("Latitude {0} exceeds the Web Mercator projection limit")]
    LatitudeOutsideProjection(f64),

    #[error("Empty geometry for record: {0}")]
    EmptyGeometry(String),

    #[error("Interpolation position must be on [0, 1], received: {0}")]
    InterpolationOutOfRange(f64),

    #[error("Class id {0} is missing from the class-label map")]
    UnknownClassId(i64),

    #[error("Unreadable input source {path}: {detail}")]
    UnreadableSource { path: String, detail: String },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PartialEq for SightlineError {
    fn eq(&self, other: &Self) -> bool {
        use SightlineError::*;
        match (self, other) {
            (InvalidCoordinate(a1, b1), InvalidCoordinate(a2, b2)) => a1 == a2 && b1 == b2,
            (LatitudeOutsideProjection(a), LatitudeOutsideProjection(b)) => a == b,
            (EmptyGeometry(a), EmptyGeometry(b)) => a == b,
            (InterpolationOutOfRange(a), InterpolationOutOfRange(b)) => a == b,
            (UnknownClassId(a), UnknownClassId(b)) => a == b,
            (UnreadableSource { path: a, .. }, UnreadableSource { path: b, .. }) => a == b,

            // Wrapped errors are not comparable: equality on variant only
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,

            _ => false,
        }
    }
}
