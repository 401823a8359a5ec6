//! Error types for artifact loading and prediction.

use thiserror::Error;

/// Errors raised while loading or validating a fitted artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The artifact file could not be read
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The artifact file is not valid JSON
    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact deserialized but fails structural validation
    #[error("artifact validation failed: {0}")]
    Validation(String),
}

/// Errors raised by one prediction call.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The scaler or classifier never loaded; prediction is degraded
    #[error("prediction models are not loaded; check server logs")]
    ModelsUnavailable,

    /// A submitted value does not parse as a finite number
    #[error("invalid value for '{field}': expected a finite number")]
    InvalidInput { field: String },

    /// The submitted feature count does not match the fitted shape
    #[error("expected {expected} features, but received {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// The scaler or classifier rejected the assembled vector
    #[error("transform failed: {0}")]
    Transform(String),
}
