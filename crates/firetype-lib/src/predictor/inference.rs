//! Tree-ensemble inference
//!
//! Runs the loaded classifier on one scaled row. Whatever label the
//! ensemble returns is final; there is no thresholding or retry.

use super::Predictor;
use crate::artifacts::TreeEnsemble;
use crate::error::PredictError;
use crate::models::{ClassLabel, ScaledFeatures};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
pub const MAX_INFERENCE_MS: u128 = 5;

/// Predictor backed by the loaded tree ensemble
pub struct ForestPredictor {
    model: Arc<TreeEnsemble>,
}

impl ForestPredictor {
    pub fn new(model: Arc<TreeEnsemble>) -> Self {
        Self { model }
    }

    fn check_arity(&self, features: &ScaledFeatures) -> Result<(), PredictError> {
        if features.len() != self.model.n_features() {
            return Err(PredictError::ArityMismatch {
                expected: self.model.n_features(),
                found: features.len(),
            });
        }
        Ok(())
    }
}

impl Predictor for ForestPredictor {
    fn predict(&self, features: &ScaledFeatures) -> Result<ClassLabel, PredictError> {
        let start = Instant::now();
        self.check_arity(features)?;

        let label = self.model.predict(features.as_slice());

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), label, "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), label, "Inference completed");
        }

        Ok(label)
    }

    fn model_version(&self) -> &str {
        self.model.version()
    }
}
