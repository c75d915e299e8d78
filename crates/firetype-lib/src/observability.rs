//! Observability for the classifier service
//!
//! Provides:
//! - Prometheus metrics (prediction and explanation latency, predictions by category, error counts, model version)
//! - Structured JSON logging with tracing

use crate::models::SensorReading;
use crate::predictor::FireCategory;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    explanation_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    rejected_inputs: IntCounter,
    scaling_errors: IntCounter,
    prediction_errors: IntCounter,
    explanation_errors: IntCounter,
    model_version_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "firetype_prediction_latency_seconds",
                "Time spent scaling inputs and running the classifier",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            explanation_latency_seconds: register_histogram!(
                "firetype_explanation_latency_seconds",
                "Time spent computing feature attributions",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register explanation_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "firetype_predictions_total",
                "Predictions served, by fire category",
                &["category"]
            )
            .expect("Failed to register predictions_total"),

            rejected_inputs: register_int_counter!(
                "firetype_rejected_inputs_total",
                "Form submissions rejected before reaching the model"
            )
            .expect("Failed to register rejected_inputs"),

            scaling_errors: register_int_counter!(
                "firetype_scaling_errors_total",
                "Requests aborted because the scaler failed"
            )
            .expect("Failed to register scaling_errors"),

            prediction_errors: register_int_counter!(
                "firetype_prediction_errors_total",
                "Requests aborted because the classifier failed"
            )
            .expect("Failed to register prediction_errors"),

            explanation_errors: register_int_counter!(
                "firetype_explanation_errors_total",
                "Predictions shown without an explanation chart"
            )
            .expect("Failed to register explanation_errors"),

            model_version_info: register_gauge_vec!(
                "firetype_model_version_info",
                "Information about the currently loaded classifier",
                &["version", "model_type"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_explanation_latency(&self, duration_secs: f64) {
        self.inner().explanation_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, category: FireCategory) {
        self.inner()
            .predictions_total
            .with_label_values(&[category.as_str()])
            .inc();
    }

    pub fn predictions_for(&self, category: FireCategory) -> u64 {
        self.inner()
            .predictions_total
            .with_label_values(&[category.as_str()])
            .get()
    }

    pub fn inc_rejected_inputs(&self) {
        self.inner().rejected_inputs.inc();
    }

    pub fn inc_scaling_errors(&self) {
        self.inner().scaling_errors.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_explanation_errors(&self) {
        self.inner().explanation_errors.inc();
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str, model_type: &str) {
        // Only one classifier is loaded at a time
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version, model_type])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Consistent JSON-formatted events for startup, artifact loading,
/// predictions and the failures a request can hit.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, bind: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            service_version = %version,
            bind = %bind,
            "Fire type classifier started"
        );
    }

    pub fn log_artifacts_loaded(
        &self,
        model_version: &str,
        model_type: &str,
        n_trees: usize,
        classifier_checksum: &str,
        scaler_checksum: &str,
    ) {
        info!(
            event = "artifacts_loaded",
            service = %self.service,
            model_version = %model_version,
            model_type = %model_type,
            n_trees = n_trees,
            classifier_checksum = %classifier_checksum,
            scaler_checksum = %scaler_checksum,
            "Model artifacts loaded"
        );
    }

    /// Session-fatal: the form will not be rendered
    pub fn log_artifact_load_failed(&self, error: &str) {
        error!(
            event = "artifact_load_failed",
            service = %self.service,
            error = %error,
            "Error loading model or scaler"
        );
    }

    pub fn log_prediction(
        &self,
        reading: &SensorReading,
        label: i64,
        category: FireCategory,
        model_version: &str,
        explained: bool,
    ) {
        info!(
            event = "prediction_generated",
            service = %self.service,
            brightness = reading.brightness,
            bright_t31 = reading.bright_t31,
            frp = reading.frp,
            scan = reading.scan,
            track = reading.track,
            confidence = %reading.confidence,
            label = label,
            category = %category.as_str(),
            model_version = %model_version,
            explained = explained,
            "Generated fire type prediction"
        );
    }

    pub fn log_input_rejected(&self, reason: &str) {
        info!(
            event = "input_rejected",
            service = %self.service,
            reason = %reason,
            "Form input rejected"
        );
    }

    pub fn log_scaling_failed(&self, error: &str) {
        warn!(
            event = "scaling_failed",
            service = %self.service,
            error = %error,
            "Scaler failed to transform input"
        );
    }

    pub fn log_prediction_failed(&self, error: &str) {
        warn!(
            event = "prediction_failed",
            service = %self.service,
            error = %error,
            "Classifier failed on scaled input"
        );
    }

    /// Recoverable: the prediction is still shown
    pub fn log_explanation_failed(&self, label: i64, error: &str) {
        warn!(
            event = "explanation_failed",
            service = %self.service,
            label = label,
            error = %error,
            "Explanation failed, showing prediction without chart"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Fire type classifier shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_creation() {
        let metrics = ServiceMetrics::new();

        metrics.observe_prediction_latency(0.0002);
        metrics.observe_explanation_latency(0.001);
        metrics.set_model_version("v1", "random_forest");
        metrics.inc_rejected_inputs();
        metrics.inc_scaling_errors();
        metrics.inc_prediction_errors();
        metrics.inc_explanation_errors();
    }

    #[test]
    fn test_predictions_counted_per_category() {
        let metrics = ServiceMetrics::new();
        let before = metrics.predictions_for(FireCategory::OffshoreFire);
        metrics.inc_predictions(FireCategory::OffshoreFire);
        metrics.inc_predictions(FireCategory::OffshoreFire);
        assert!(metrics.predictions_for(FireCategory::OffshoreFire) >= before + 2);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("firetype");
        assert_eq!(logger.service, "firetype");
        logger.log_prediction(
            &SensorReading::default(),
            0,
            FireCategory::VegetationFire,
            "v1",
            true,
        );
    }
}
