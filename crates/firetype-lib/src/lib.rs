//! Fire type classification library
//!
//! This crate provides the core functionality for:
//! - Loading and validating the classifier and scaler artifacts
//! - Scaling MODIS readings and predicting the fire category
//! - TreeSHAP attribution and waterfall rendering
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod render;

pub use artifacts::{ArtifactConfig, ArtifactLoader, ModelArtifacts};
pub use error::{ArtifactError, ExplainError, InputError, PipelineError, PredictError, ScaleError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{PipelineContext, PredictionOutcome};
