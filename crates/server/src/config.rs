//! Server configuration

use anyhow::Result;
use firetype_lib::artifacts::{ArtifactConfig, DEFAULT_MAX_ARTIFACT_BYTES};
use firetype_lib::render::DEFAULT_MAX_DISPLAY;
use serde::Deserialize;
use std::path::PathBuf;

/// Config file read when `FIRETYPE_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "firetype.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_classifier_path")]
    pub classifier_path: PathBuf,

    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,

    /// Expected SHA-256 of the classifier file, hex
    #[serde(default)]
    pub classifier_sha256: Option<String>,

    /// Expected SHA-256 of the scaler file, hex
    #[serde(default)]
    pub scaler_sha256: Option<String>,

    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,

    /// Rows in the waterfall chart
    #[serde(default = "default_max_display")]
    pub max_display: usize,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_classifier_path() -> PathBuf {
    PathBuf::from("fire_classifier.json")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("scaler.json")
}

fn default_max_artifact_bytes() -> u64 {
    DEFAULT_MAX_ARTIFACT_BYTES
}

fn default_max_display() -> usize {
    DEFAULT_MAX_DISPLAY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            classifier_path: default_classifier_path(),
            scaler_path: default_scaler_path(),
            classifier_sha256: None,
            scaler_sha256: None,
            max_artifact_bytes: default_max_artifact_bytes(),
            max_display: default_max_display(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the optional config file, then the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("FIRETYPE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load with an explicit config file path; a missing file is not an error
    pub fn load_from(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("FIRETYPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn artifact_config(&self) -> ArtifactConfig {
        ArtifactConfig {
            classifier_path: self.classifier_path.clone(),
            scaler_path: self.scaler_path.clone(),
            classifier_sha256: self.classifier_sha256.clone(),
            scaler_sha256: self.scaler_sha256.clone(),
            max_artifact_bytes: self.max_artifact_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8501");
        assert_eq!(config.max_display, 6);
        assert_eq!(config.log_format, LogFormat::Json);

        let artifacts = config.artifact_config();
        assert_eq!(artifacts.classifier_path, PathBuf::from("fire_classifier.json"));
        assert_eq!(artifacts.scaler_path, PathBuf::from("scaler.json"));
        assert_eq!(artifacts.max_artifact_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 8501);
        assert!(config.classifier_sha256.is_none());
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firetype.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "port = 9000\nclassifier_path = \"/models/rf.json\"\nmax_display = 4\nlog_format = \"pretty\""
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.classifier_path, PathBuf::from("/models/rf.json"));
        assert_eq!(config.max_display, 4);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.scaler_path, PathBuf::from("scaler.json"));
    }
}
