//! End-to-end prediction for one form submission
//!
//! `PipelineContext` is built once from the loaded artifacts and passed to
//! every request. It holds no mutable state, so concurrent requests share
//! it without locking.

use crate::artifacts::ModelArtifacts;
use crate::error::{ExplainError, PipelineError};
use crate::models::{ClassLabel, RawFeatures, ScaledFeatures, SensorReading};
use crate::predictor::{
    Attribution, Explainer, FeaturePipeline, FeatureScaler, FireCategory, ForestPredictor,
    Predictor, TreeShapExplainer,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Immutable wiring of scaler, classifier and explainer
#[derive(Clone)]
pub struct PipelineContext {
    features: FeaturePipeline,
    predictor: Arc<dyn Predictor>,
    explainer: Arc<dyn Explainer>,
}

impl PipelineContext {
    pub fn new(
        scaler: Arc<dyn FeatureScaler>,
        predictor: Arc<dyn Predictor>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        Self {
            features: FeaturePipeline::new(scaler),
            predictor,
            explainer,
        }
    }

    /// Context backed by the loaded tree ensemble and scaler
    pub fn from_artifacts(artifacts: &ModelArtifacts) -> Self {
        Self::new(
            artifacts.scaler.clone(),
            Arc::new(ForestPredictor::new(artifacts.classifier.clone())),
            Arc::new(TreeShapExplainer::new(artifacts.classifier.clone())),
        )
    }

    pub fn model_version(&self) -> &str {
        self.predictor.model_version()
    }

    /// Run scale → predict → label → explain for one reading
    ///
    /// Scaling or classifier failures abort the request. An explanation
    /// failure is carried in the outcome so the prediction still shows.
    pub fn predict(&self, reading: &SensorReading) -> Result<PredictionOutcome, PipelineError> {
        let start = Instant::now();

        let (raw, scaled) = self.features.extract(reading)?;
        let label = self.predictor.predict(&scaled)?;
        let category = FireCategory::from_label(label);
        let predict_elapsed = start.elapsed();

        let explain_start = Instant::now();
        let explanation = self.explainer.explain(&scaled, label);
        let explain_elapsed = explain_start.elapsed();

        debug!(
            label,
            category = category.as_str(),
            explained = explanation.is_ok(),
            "Pipeline completed"
        );

        Ok(PredictionOutcome {
            reading: *reading,
            raw,
            scaled,
            label,
            category,
            explanation,
            predict_duration_us: predict_elapsed.as_micros() as u64,
            explain_duration_us: explain_elapsed.as_micros() as u64,
        })
    }
}

/// Everything one prediction request produced
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub reading: SensorReading,
    pub raw: RawFeatures,
    pub scaled: ScaledFeatures,
    pub label: ClassLabel,
    pub category: FireCategory,
    pub explanation: Result<Attribution, ExplainError>,
    pub predict_duration_us: u64,
    pub explain_duration_us: u64,
}
