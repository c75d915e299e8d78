//! HTTP API: the classifier form plus health checks and Prometheus metrics

use crate::config::AppConfig;
use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use firetype_lib::{
    artifacts::{ArtifactLoader, ModelArtifacts},
    health::{components, ComponentStatus, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    render::{render_fatal_page, render_form_page, waterfall_svg, ChartView, FormPage, ResultBlock},
    ArtifactError, Confidence, InputError, PipelineContext, PipelineError, SensorReading,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Whether the artifacts loaded
pub enum ServiceState {
    Ready(PipelineContext),
    /// Session-fatal load failure; the message is shown on every page view
    Failed(String),
}

/// Shared application state
pub struct AppState {
    pub service: ServiceState,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    pub max_display: usize,
}

impl AppState {
    pub fn new(
        service: ServiceState,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
        max_display: usize,
    ) -> Self {
        Self {
            service,
            health_registry,
            metrics,
            logger,
            max_display,
        }
    }

    /// Load the artifacts and record the outcome in health, metrics and logs
    ///
    /// A load failure does not stop the server: every page shows the fatal
    /// message and readiness stays false.
    pub async fn initialise(
        config: &AppConfig,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        health_registry.register_all().await;

        let loader = ArtifactLoader::new(config.artifact_config());
        let service = match loader.load() {
            Ok(artifacts) => {
                record_loaded(&artifacts, &metrics, &logger);
                health_registry.set_ready(true).await;
                ServiceState::Ready(PipelineContext::from_artifacts(&artifacts))
            }
            Err(e) => {
                let message = e.to_string();
                logger.log_artifact_load_failed(&message);
                health_registry
                    .set_unhealthy(components::ARTIFACTS, message.clone())
                    .await;
                ServiceState::Failed(fatal_message(&e))
            }
        };

        Self::new(service, health_registry, metrics, logger, config.max_display)
    }
}

fn record_loaded(artifacts: &ModelArtifacts, metrics: &ServiceMetrics, logger: &StructuredLogger) {
    let classifier = &artifacts.classifier;
    metrics.set_model_version(classifier.version(), classifier.kind().as_str());
    logger.log_artifacts_loaded(
        classifier.version(),
        classifier.kind().as_str(),
        classifier.trees().len(),
        &artifacts.classifier_checksum,
        &artifacts.scaler_checksum,
    );
}

fn fatal_message(error: &ArtifactError) -> String {
    match error {
        ArtifactError::Missing { .. } => format!(
            "{}. Make sure both the classifier and scaler artifacts are present.",
            error
        ),
        _ => error.to_string(),
    }
}

/// Raw form submission, validated into a `SensorReading` before use
#[derive(Debug, Deserialize)]
pub struct PredictForm {
    pub brightness: f64,
    pub bright_t31: f64,
    pub frp: f64,
    pub scan: f64,
    pub track: f64,
    pub confidence: String,
}

impl PredictForm {
    /// Apply the control bounds again; the browser's checks are not trusted
    pub fn validate(&self) -> Result<SensorReading, InputError> {
        let confidence: Confidence = self.confidence.parse()?;
        SensorReading::new(
            self.brightness,
            self.bright_t31,
            self.frp,
            self.scan,
            self.track,
            confidence,
        )
    }

    /// Values to put back into the controls when validation fails
    fn as_submitted(&self) -> SensorReading {
        SensorReading {
            brightness: self.brightness,
            bright_t31: self.bright_t31,
            frp: self.frp,
            scan: self.scan,
            track: self.track,
            confidence: self.confidence.parse().unwrap_or_default(),
        }
    }
}

fn fatal_response(message: &str) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Html(render_fatal_page(message))).into_response()
}

fn page_response(status: StatusCode, page: &FormPage) -> Response {
    (status, Html(render_form_page(page))).into_response()
}

/// Form page in the awaiting-input state
async fn index(State(state): State<Arc<AppState>>) -> Response {
    match &state.service {
        ServiceState::Failed(message) => fatal_response(message),
        ServiceState::Ready(_) => page_response(StatusCode::OK, &FormPage::default()),
    }
}

/// One run of the pipeline for a form submission
async fn predict(
    State(state): State<Arc<AppState>>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> Response {
    let ctx = match &state.service {
        ServiceState::Failed(message) => return fatal_response(message),
        ServiceState::Ready(ctx) => ctx,
    };

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let reason = rejection.body_text();
            state.metrics.inc_rejected_inputs();
            state.logger.log_input_rejected(&reason);
            let page = FormPage::with_error(
                SensorReading::default(),
                format!("Invalid form submission: {}", reason),
            );
            return page_response(StatusCode::UNPROCESSABLE_ENTITY, &page);
        }
    };

    let reading = match form.validate() {
        Ok(reading) => reading,
        Err(e) => {
            state.metrics.inc_rejected_inputs();
            state.logger.log_input_rejected(&e.to_string());
            let page = FormPage::with_error(form.as_submitted(), format!("Invalid input: {}", e));
            return page_response(StatusCode::UNPROCESSABLE_ENTITY, &page);
        }
    };

    let outcome = match ctx.predict(&reading) {
        Ok(outcome) => outcome,
        Err(e) => return pipeline_failure(&state, reading, e),
    };

    state
        .metrics
        .observe_prediction_latency(outcome.predict_duration_us as f64 / 1_000_000.0);
    state.metrics.inc_predictions(outcome.category);

    let chart = match &outcome.explanation {
        Ok(attribution) => {
            state
                .metrics
                .observe_explanation_latency(outcome.explain_duration_us as f64 / 1_000_000.0);
            if state.health_registry.status_of(components::EXPLAINER).await
                != Some(ComponentStatus::Healthy)
            {
                state.health_registry.set_healthy(components::EXPLAINER).await;
            }
            ChartView::Svg(waterfall_svg(attribution, state.max_display))
        }
        Err(e) => {
            let message = e.to_string();
            state.metrics.inc_explanation_errors();
            state.logger.log_explanation_failed(outcome.label, &message);
            state
                .health_registry
                .set_degraded(components::EXPLAINER, message.clone())
                .await;
            ChartView::Warning(message)
        }
    };

    state.logger.log_prediction(
        &reading,
        outcome.label,
        outcome.category,
        ctx.model_version(),
        outcome.explanation.is_ok(),
    );

    let page = FormPage::with_result(
        reading,
        ResultBlock {
            category: outcome.category,
            chart,
        },
    );
    page_response(StatusCode::OK, &page)
}

/// Scaling and classifier failures abort the request without a banner
fn pipeline_failure(state: &AppState, reading: SensorReading, error: PipelineError) -> Response {
    let message = error.to_string();
    let (status, text) = match &error {
        PipelineError::Input(e) => {
            state.metrics.inc_rejected_inputs();
            state.logger.log_input_rejected(&message);
            (StatusCode::UNPROCESSABLE_ENTITY, format!("Invalid input: {}", e))
        }
        PipelineError::Scale(e) => {
            state.metrics.inc_scaling_errors();
            state.logger.log_scaling_failed(&message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Scaler failed to transform input: {}", e),
            )
        }
        PipelineError::Predict(e) => {
            state.metrics.inc_prediction_errors();
            state.logger.log_prediction_failed(&message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Classifier failed on this input: {}", e),
            )
        }
    };
    page_response(status, &FormPage::with_error(reading, text))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving predictions
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", get(index).post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the HTTP server, stopping when `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
