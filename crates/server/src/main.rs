//! Fire type classifier server binary
//!
//! Loads the classifier and scaler once, then serves the form until
//! interrupted.

use anyhow::Result;
use firetype_lib::{
    health::HealthRegistry,
    observability::{ServiceMetrics, StructuredLogger},
};
use firetype_server::{
    api::{self, AppState},
    config::{AppConfig, LogFormat},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "firetype-server";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init(),
    }
}

async fn shutdown_signal(logger: StructuredLogger) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    logger.log_shutdown("SIGINT received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.log_format);

    info!(
        classifier = %config.classifier_path.display(),
        scaler = %config.scaler_path.display(),
        "Starting fire type classifier"
    );

    let health_registry = HealthRegistry::new();
    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(SERVICE_NAME);

    // A failed load still serves the fatal page
    let state = Arc::new(
        AppState::initialise(&config, health_registry, metrics, logger.clone()).await,
    );

    let addr = config.bind_addr();
    logger.log_startup(SERVICE_VERSION, &addr);

    api::serve(&addr, state, shutdown_signal(logger)).await?;
    info!("Shut down");

    Ok(())
}
