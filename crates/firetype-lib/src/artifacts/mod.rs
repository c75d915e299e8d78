//! Model artifact loading
//!
//! The classifier and scaler are read once at start-up, validated, and
//! then shared read-only for the rest of the process. Any failure here is
//! session-fatal.

mod forest;
mod scaler;

pub use forest::{
    ClassifierFile, EnsembleKind, Node, Split, Tree, TreeArrays, TreeEnsemble,
    CLASSIFIER_FORMAT_VERSION, MAX_TREE_DEPTH,
};
pub use scaler::{FittedScaler, ScalerFile, ScalerTransform, SCALER_FORMAT_VERSION};

#[cfg(test)]
pub(crate) use forest::test_support;

use crate::error::ArtifactError;
use crate::models::NUM_FEATURES;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default maximum artifact size (50 MiB)
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 50 * 1024 * 1024;

/// Where to find the artifacts and how to verify them
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub classifier_path: PathBuf,
    pub scaler_path: PathBuf,
    /// Expected SHA-256 hex digest of the classifier file
    pub classifier_sha256: Option<String>,
    /// Expected SHA-256 hex digest of the scaler file
    pub scaler_sha256: Option<String>,
    pub max_artifact_bytes: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            classifier_path: PathBuf::from("fire_classifier.json"),
            scaler_path: PathBuf::from("scaler.json"),
            classifier_sha256: None,
            scaler_sha256: None,
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

/// Classifier and scaler, immutable once loaded
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub classifier: Arc<TreeEnsemble>,
    pub scaler: Arc<FittedScaler>,
    pub classifier_checksum: String,
    pub scaler_checksum: String,
}

impl ModelArtifacts {
    /// Pair an already-validated classifier and scaler
    pub fn new(classifier: TreeEnsemble, scaler: FittedScaler) -> Result<Self, ArtifactError> {
        check_arity(&classifier, &scaler)?;
        Ok(Self {
            classifier: Arc::new(classifier),
            scaler: Arc::new(scaler),
            classifier_checksum: String::new(),
            scaler_checksum: String::new(),
        })
    }
}

fn check_arity(classifier: &TreeEnsemble, scaler: &FittedScaler) -> Result<(), ArtifactError> {
    if scaler.n_features_in() != classifier.n_features() {
        return Err(ArtifactError::ArityMismatch {
            scaler: scaler.n_features_in(),
            classifier: classifier.n_features(),
        });
    }
    if classifier.n_features() != NUM_FEATURES {
        return Err(ArtifactError::invalid(
            "classifier",
            format!(
                "expects {} features, the form provides {}",
                classifier.n_features(),
                NUM_FEATURES
            ),
        ));
    }
    Ok(())
}

/// Loads and validates both artifacts
pub struct ArtifactLoader {
    config: ArtifactConfig,
}

impl ArtifactLoader {
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }

    /// Load both artifacts; either both succeed or the load fails
    pub fn load(&self) -> Result<ModelArtifacts, ArtifactError> {
        let (classifier_file, classifier_checksum): (ClassifierFile, _) = self.read_json(
            &self.config.classifier_path,
            self.config.classifier_sha256.as_deref(),
        )?;
        let classifier = TreeEnsemble::from_file(classifier_file)?;

        let (scaler_file, scaler_checksum): (ScalerFile, _) =
            self.read_json(&self.config.scaler_path, self.config.scaler_sha256.as_deref())?;
        let scaler = FittedScaler::from_file(scaler_file)?;

        check_arity(&classifier, &scaler)?;

        info!(
            classifier = %self.config.classifier_path.display(),
            scaler = %self.config.scaler_path.display(),
            model_version = %classifier.version(),
            trees = classifier.trees().len(),
            classes = ?classifier.classes(),
            scaler_kind = scaler.transform_kind(),
            "Model artifacts loaded"
        );

        Ok(ModelArtifacts {
            classifier: Arc::new(classifier),
            scaler: Arc::new(scaler),
            classifier_checksum,
            scaler_checksum,
        })
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<(T, String), ArtifactError> {
        let bytes = read_artifact(path, self.config.max_artifact_bytes)?;
        let checksum = compute_checksum(&bytes);

        if let Some(expected) = expected_sha256 {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(ArtifactError::ChecksumMismatch {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    actual: checksum,
                });
            }
            debug!(path = %path.display(), checksum = %checksum, "Artifact checksum validated");
        }

        let value = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((value, checksum))
    }
}

fn read_artifact(path: &Path, limit: u64) -> Result<Vec<u8>, ArtifactError> {
    let metadata = fs::metadata(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ArtifactError::Missing {
            path: path.to_path_buf(),
        },
        _ => ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if metadata.len() > limit {
        return Err(ArtifactError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit,
        });
    }

    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
