//! Fire type classifier server
//!
//! Serves the classifier form over HTTP, alongside health, readiness and
//! Prometheus endpoints.

pub mod api;
pub mod config;
