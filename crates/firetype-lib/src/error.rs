//! Error types for the classification pipeline
//!
//! `ArtifactError` is session-fatal: without both artifacts nothing can be
//! predicted. The remaining errors are scoped to a single request.

use crate::models::ClassLabel;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading the classifier or scaler
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found at {path}")]
    Missing { path: PathBuf },

    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to decode artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported {artifact} format version {found} (expected {expected})")]
    UnsupportedVersion {
        artifact: &'static str,
        found: u32,
        expected: u32,
    },

    #[error("invalid {artifact}: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },

    #[error("scaler expects {scaler} features but classifier expects {classifier}")]
    ArityMismatch { scaler: usize, classifier: usize },
}

impl ArtifactError {
    pub(crate) fn invalid(artifact: &'static str, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            artifact,
            reason: reason.into(),
        }
    }
}

/// Submitted form value rejected by the input bounds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} = {value} is outside the allowed range {}", range(.min, .max))]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: Option<f64>,
    },

    #[error("unknown confidence level {0:?} (expected low, nominal or high)")]
    UnknownConfidence(String),
}

fn range(min: &f64, max: &Option<f64>) -> String {
    match max {
        Some(max) => format!("[{}, {}]", min, max),
        None => format!(">= {}", min),
    }
}

/// Scaler transform failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error("scaler expects {expected} features, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("scaled feature {index} is not finite")]
    NonFinite { index: usize },
}

/// Classifier invocation failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("classifier expects {expected} features, got {found}")]
    ArityMismatch { expected: usize, found: usize },
}

/// Attribution failure; only the chart is lost
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    #[error("class {label} has no per-class output in the loaded classifier")]
    ClassNotInModel { label: ClassLabel },

    #[error("explainer expects {expected} features, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("attribution for feature {index} is not finite")]
    NonFinite { index: usize },

    #[error("{0}")]
    Unsupported(String),
}

/// Failure that aborts a prediction request without producing a result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    #[error("scaler failed to transform input: {0}")]
    Scale(#[from] ScaleError),

    #[error("classifier failed: {0}")]
    Predict(#[from] PredictError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = InputError::OutOfRange {
            field: "brightness",
            value: 700.0,
            min: 200.0,
            max: Some(600.0),
        };
        assert_eq!(
            err.to_string(),
            "brightness = 700 is outside the allowed range [200, 600]"
        );

        let err = InputError::OutOfRange {
            field: "frp",
            value: -1.0,
            min: 0.0,
            max: None,
        };
        assert_eq!(err.to_string(), "frp = -1 is outside the allowed range >= 0");
    }

    #[test]
    fn test_pipeline_error_from_scale() {
        let err: PipelineError = ScaleError::NonFinite { index: 2 }.into();
        assert!(err.to_string().starts_with("scaler failed to transform input"));
    }
}
