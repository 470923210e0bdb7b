use thiserror::Error;

/// Input errors raised before any work is dispatched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("A date range is required")]
    MissingDateRange,
    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: String, end: String },
    #[error("Invalid {field} bounds: minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        field: &'static str,
        min: String,
        max: String,
    },
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid weight metric: {0}")]
    InvalidWeightMetric(String),
    #[error("Invalid time unit: {0}")]
    InvalidTimeUnit(String),
}
