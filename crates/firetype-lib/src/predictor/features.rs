//! Feature assembly for ML inference
//!
//! Encodes the reading into the fixed-order row the artifacts were fit on
//! and applies the loaded scaler.

use super::FeatureScaler;
use crate::artifacts::FittedScaler;
use crate::error::ScaleError;
use crate::models::{RawFeatures, ScaledFeatures, SensorReading};
use std::sync::Arc;
use tracing::debug;

impl FeatureScaler for FittedScaler {
    fn transform(&self, raw: &RawFeatures) -> Result<ScaledFeatures, ScaleError> {
        FittedScaler::transform(self, raw.as_slice())
    }
}

/// Turns a sensor reading into a scaled feature row
#[derive(Clone)]
pub struct FeaturePipeline {
    scaler: Arc<dyn FeatureScaler>,
}

impl FeaturePipeline {
    pub fn new(scaler: Arc<dyn FeatureScaler>) -> Self {
        Self { scaler }
    }

    /// Fixed-order row before scaling
    pub fn assemble(&self, reading: &SensorReading) -> RawFeatures {
        reading.to_raw_features()
    }

    /// Assemble and scale; a scaler failure aborts only this request
    pub fn extract(&self, reading: &SensorReading) -> Result<(RawFeatures, ScaledFeatures), ScaleError> {
        let raw = self.assemble(reading);
        let scaled = self.scaler.transform(&raw)?;
        debug!(raw = ?raw.as_slice(), scaled = ?scaled.as_slice(), "Features scaled");
        Ok((raw, scaled))
    }
}
