//! Prediction engine: scaling, classification, labelling and attribution

mod explain;
mod features;
mod inference;
mod output;
mod treeshap;

pub use explain::{Attribution, TreeShapExplainer};
pub use features::FeaturePipeline;
pub use inference::{ForestPredictor, MAX_INFERENCE_MS};
pub use output::{resolve_label, DisplayColor, FireCategory};
pub use treeshap::tree_shap;

use crate::error::{ExplainError, PredictError, ScaleError};
use crate::models::{ClassLabel, RawFeatures, ScaledFeatures};

/// Trait for fitted feature transforms
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, raw: &RawFeatures) -> Result<ScaledFeatures, ScaleError>;
}

/// Trait for classifier implementations
pub trait Predictor: Send + Sync {
    /// Predict the class label of one scaled row
    fn predict(&self, features: &ScaledFeatures) -> Result<ClassLabel, PredictError>;

    /// Version string of the loaded model
    fn model_version(&self) -> &str;
}

/// Trait for per-feature attribution of a prediction
pub trait Explainer: Send + Sync {
    /// Attribution values for `label`'s output at `features`
    fn explain(&self, features: &ScaledFeatures, label: ClassLabel) -> Result<Attribution, ExplainError>;
}
