//! Error types for the index-signal system.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the index-signal system.
#[derive(Error, Debug)]
pub enum Error {
    /// A calendar-day group had no usable observation after filtering.
    #[error("Incomplete group: no valid observations for {0}")]
    IncompleteGroup(NaiveDate),

    /// A feature is not defined for a row (warm-up head or non-finite value).
    #[error("Undefined feature '{column}' on {date}")]
    UndefinedFeature { date: NaiveDate, column: String },

    /// Too few complete rows remain to build a dataset.
    #[error("Empty dataset: {rows} complete rows, at least {min_rows} required")]
    EmptyDataset { rows: usize, min_rows: usize },

    /// Serving lookup miss.
    #[error("No data found for date {0}")]
    UnknownDate(NaiveDate),

    /// No model artifact was available when the service was built.
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    /// Feature columns of an artifact disagree with the dataset.
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Request variant that the resolver does not serve.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// Classifier or scaler error.
    #[error("Model error: {0}")]
    Model(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create an undefined feature error.
    pub fn undefined_feature(date: NaiveDate, column: impl Into<String>) -> Self {
        Error::UndefinedFeature {
            date,
            column: column.into(),
        }
    }

    /// Create a model-not-loaded error.
    pub fn model_not_loaded(msg: impl Into<String>) -> Self {
        Error::ModelNotLoaded(msg.into())
    }

    /// Create an artifact mismatch error.
    pub fn artifact_mismatch(msg: impl Into<String>) -> Self {
        Error::ArtifactMismatch(msg.into())
    }

    /// Create a not-implemented error.
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Error::Model(msg.into())
    }

    /// Whether this error is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::UnknownDate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert!(Error::UnknownDate(date).is_not_found());
        assert!(!Error::model_not_loaded("missing").is_not_found());
    }

    #[test]
    fn test_unknown_date_message() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            Error::UnknownDate(date).to_string(),
            "No data found for date 2024-01-05"
        );
    }
}
