//! Fitted feature scaler artifact

use crate::error::{ArtifactError, ScaleError};
use crate::models::ScaledFeatures;
use serde::{Deserialize, Serialize};

/// Scaler file format understood by this build
pub const SCALER_FORMAT_VERSION: u32 = 1;

const ARTIFACT: &str = "scaler";

/// On-disk representation of the scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerFile {
    pub format_version: u32,
    pub n_features_in: usize,
    #[serde(flatten)]
    pub transform: ScalerTransform,
}

/// Fitted per-feature statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerTransform {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// Validated scaler, immutable after load
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    n_features_in: usize,
    transform: ScalerTransform,
}

impl FittedScaler {
    pub fn from_file(file: ScalerFile) -> Result<Self, ArtifactError> {
        if file.format_version != SCALER_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                artifact: ARTIFACT,
                found: file.format_version,
                expected: SCALER_FORMAT_VERSION,
            });
        }
        Self::new(file.n_features_in, file.transform)
    }

    pub fn new(n_features_in: usize, transform: ScalerTransform) -> Result<Self, ArtifactError> {
        if n_features_in == 0 {
            return Err(ArtifactError::invalid(ARTIFACT, "n_features_in must be positive"));
        }
        let (offset_name, offset, scale) = match &transform {
            ScalerTransform::Standard { mean, scale } => ("mean", mean, scale),
            ScalerTransform::MinMax { min, scale } => ("min", min, scale),
        };
        for (name, values) in [(offset_name, offset), ("scale", scale)] {
            if values.len() != n_features_in {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("{} has {} entries, expected {}", name, values.len(), n_features_in),
                ));
            }
            if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("{}[{}] is not finite", name, i),
                ));
            }
        }
        if let Some(i) = scale.iter().position(|s| *s == 0.0) {
            return Err(ArtifactError::invalid(ARTIFACT, format!("scale[{}] is zero", i)));
        }

        Ok(Self {
            n_features_in,
            transform,
        })
    }

    pub fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    pub fn transform_kind(&self) -> &'static str {
        match self.transform {
            ScalerTransform::Standard { .. } => "standard",
            ScalerTransform::MinMax { .. } => "min_max",
        }
    }

    /// Apply the fitted transform to one row
    pub fn transform(&self, x: &[f64]) -> Result<ScaledFeatures, ScaleError> {
        if x.len() != self.n_features_in {
            return Err(ScaleError::ArityMismatch {
                expected: self.n_features_in,
                found: x.len(),
            });
        }

        let scaled: Vec<f64> = match &self.transform {
            ScalerTransform::Standard { mean, scale } => x
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(v, (m, s))| (v - m) / s)
                .collect(),
            ScalerTransform::MinMax { min, scale } => x
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(v, (m, s))| v * s + m)
                .collect(),
        };

        if let Some(index) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ScaleError::NonFinite { index });
        }
        Ok(ScaledFeatures(scaled))
    }
}
