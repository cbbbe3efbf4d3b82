//! Match model: the classifier contract, the logistic-regression artifact and
//! its lifecycle (load, bootstrap, atomic publish, in-process reload).
//!
//! `AppState` holds an `Arc<ModelHandle>`. Requests take an `Arc` snapshot of
//! the current classifier; a reload swaps the pointer and never trains.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::recommend::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::recommend::scorer::MatchScorer;
use crate::recommend::training::bootstrap_model;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("model expects {expected} coefficients, has {actual}")]
    CoefficientMismatch { expected: usize, actual: usize },

    #[error("feature vector contains a non-finite value")]
    NonFiniteInput,

    #[error("model produced a non-finite probability")]
    NonFiniteOutput,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write model artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported model artifact format version {0}")]
    UnsupportedFormat(u32),

    #[error("model artifact was trained on features {found:?}, expected {expected:?}")]
    FeatureOrder {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("training set needs both positive and negative outcomes")]
    SingleClass,
}

/// Where a model came from. Bootstrap models are stand-ins trained on
/// synthetic priors; feedback models are trained on the feedback log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelProvenance {
    Bootstrap,
    Feedback { samples: usize, positives: usize },
}

impl ModelProvenance {
    pub fn label(&self) -> &'static str {
        match self {
            ModelProvenance::Bootstrap => "bootstrap",
            ModelProvenance::Feedback { .. } => "feedback",
        }
    }
}

/// A binary probabilistic classifier over `FeatureVector`s.
///
/// Implement this to swap model backends; the scorer only sees the trait.
pub trait Classifier: Send + Sync {
    /// Probability of a positive outcome.
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScoreError>;

    fn provenance(&self) -> &ModelProvenance;
}

/// Serialized form of a trained logistic-regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub provenance: ModelProvenance,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    artifact: ModelArtifact,
}

impl LogisticModel {
    pub fn new(coefficients: [f64; FEATURE_COUNT], intercept: f64, provenance: ModelProvenance) -> Self {
        Self {
            artifact: ModelArtifact {
                format_version: ARTIFACT_FORMAT_VERSION,
                provenance,
                feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
                coefficients: coefficients.to_vec(),
                intercept,
            },
        }
    }

    /// Validates format version and feature order before accepting an artifact.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormat(artifact.format_version));
        }
        if artifact.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(ModelError::FeatureOrder {
                found: artifact.feature_names,
                expected: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            });
        }
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn into_artifact(self) -> ModelArtifact {
        self.artifact
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        let coefficients = &self.artifact.coefficients;
        if coefficients.len() != FEATURE_COUNT {
            return Err(ScoreError::CoefficientMismatch {
                expected: FEATURE_COUNT,
                actual: coefficients.len(),
            });
        }
        let values = features.to_array();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScoreError::NonFiniteInput);
        }

        let z = self.artifact.intercept
            + coefficients
                .iter()
                .zip(values.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        let p = sigmoid(z);
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ScoreError::NonFiniteOutput)
        }
    }

    fn provenance(&self) -> &ModelProvenance {
        &self.artifact.provenance
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ────────────────────────────────────────────────────────────────────────────
// Artifact persistence
// ────────────────────────────────────────────────────────────────────────────

/// Reads an artifact. `Ok(None)` when no file exists at `path`.
pub fn load_artifact(path: &Path) -> Result<Option<LogisticModel>, ModelError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ModelError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let artifact: ModelArtifact = serde_json::from_str(&contents)?;
    LogisticModel::from_artifact(artifact).map(Some)
}

/// Publishes an artifact by writing a temp file beside `path` and renaming it
/// over the target, so readers see either the old or the new file.
pub fn save_artifact(path: &Path, model: &LogisticModel) -> Result<(), ModelError> {
    let write_err = |source: io::Error| ModelError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(model.artifact())?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Loads the artifact at `path`, or trains and publishes the bootstrap model
/// when none exists. An unreadable or incompatible artifact is an error and is
/// never overwritten.
pub fn load_or_bootstrap(path: &Path) -> Result<LogisticModel, ModelError> {
    if let Some(model) = load_artifact(path)? {
        info!(
            "Loaded {} match model from {}",
            model.provenance().label(),
            path.display()
        );
        return Ok(model);
    }

    info!("No match model at {}, training bootstrap model", path.display());
    save_artifact(path, &bootstrap_model()?)?;
    info!("Bootstrap match model written to {}", path.display());
    // Serve what later boots will read, not the in-memory copy.
    load_artifact(path)?.ok_or_else(|| ModelError::Missing(path.to_path_buf()))
}

// ────────────────────────────────────────────────────────────────────────────
// Process-wide handle
// ────────────────────────────────────────────────────────────────────────────

pub struct ModelHandle {
    path: PathBuf,
    current: RwLock<Arc<dyn Classifier>>,
}

impl ModelHandle {
    pub fn new(path: PathBuf, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            path,
            current: RwLock::new(classifier),
        }
    }

    pub fn load_or_bootstrap(path: PathBuf) -> Result<Self, ModelError> {
        let model = load_or_bootstrap(&path)?;
        Ok(Self::new(path, Arc::new(model)))
    }

    pub fn current(&self) -> Arc<dyn Classifier> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// A scorer bound to the model that is current right now.
    pub fn scorer(&self) -> MatchScorer {
        MatchScorer::new(self.current())
    }

    pub fn provenance(&self) -> ModelProvenance {
        self.current().provenance().clone()
    }

    /// Re-reads the published artifact and swaps it in. The previous model
    /// stays active if the artifact is missing or invalid.
    pub fn reload(&self) -> Result<ModelProvenance, ModelError> {
        let model =
            load_artifact(&self.path)?.ok_or_else(|| ModelError::Missing(self.path.clone()))?;
        let provenance = model.provenance().clone();
        let model: Arc<dyn Classifier> = Arc::new(model);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = model;
        info!("Reloaded {} match model from {}", provenance.label(), self.path.display());
        Ok(provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(values: [f64; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector::from_array(values)
    }

    #[test]
    fn test_predict_is_probability() {
        let model = LogisticModel::new([2.0, 1.0, 0.5, 1.0], -1.5, ModelProvenance::Bootstrap);
        for values in [[0.0; 4], [1.0; 4], [0.3, 0.0, 1.0, 0.5]] {
            let p = model.predict_proba(&features(values)).unwrap();
            assert!((0.0..=1.0).contains(&p), "p was {p}");
        }
    }

    #[test]
    fn test_zero_model_predicts_half() {
        let model = LogisticModel::new([0.0; 4], 0.0, ModelProvenance::Bootstrap);
        let p = model.predict_proba(&features([1.0, 1.0, 1.0, 1.0])).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let model = LogisticModel::new([1.0; 4], 0.0, ModelProvenance::Bootstrap);
        let result = model.predict_proba(&features([f64::NAN, 0.0, 1.0, 0.5]));
        assert!(matches!(result, Err(ScoreError::NonFiniteInput)));
    }

    #[test]
    fn test_wrong_coefficient_count_is_an_error() {
        let mut artifact = LogisticModel::new([1.0; 4], 0.0, ModelProvenance::Bootstrap).into_artifact();
        artifact.coefficients.pop();
        let model = LogisticModel::from_artifact(artifact).unwrap();
        assert!(matches!(
            model.predict_proba(&features([0.0; 4])),
            Err(ScoreError::CoefficientMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_rejects_reordered_features() {
        let mut artifact = LogisticModel::new([1.0; 4], 0.0, ModelProvenance::Bootstrap).into_artifact();
        artifact.feature_names.swap(0, 1);
        assert!(matches!(
            LogisticModel::from_artifact(artifact),
            Err(ModelError::FeatureOrder { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut artifact = LogisticModel::new([1.0; 4], 0.0, ModelProvenance::Bootstrap).into_artifact();
        artifact.format_version = 99;
        assert!(matches!(
            LogisticModel::from_artifact(artifact),
            Err(ModelError::UnsupportedFormat(99))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let model = LogisticModel::new(
            [0.4, 0.7, 0.3, 0.35],
            -0.9,
            ModelProvenance::Feedback { samples: 12, positives: 5 },
        );
        save_artifact(&path, &model).unwrap();
        let loaded = load_artifact(&path).unwrap().unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_missing_artifact_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_artifact(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_bootstrap_written_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = load_or_bootstrap(&path).unwrap();
        assert_eq!(model.provenance(), &ModelProvenance::Bootstrap);
        assert!(path.exists());

        // Second start loads the published artifact instead of retraining.
        let again = load_or_bootstrap(&path).unwrap();
        assert_eq!(again, model);
        assert_eq!(
            again.artifact().intercept.to_bits(),
            model.artifact().intercept.to_bits()
        );
    }

    #[test]
    fn test_saved_artifact_reloads_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let trained = bootstrap_model().unwrap();
        save_artifact(&path, &trained).unwrap();

        let loaded = load_artifact(&path).unwrap().unwrap();
        assert_eq!(loaded, trained);
        let bits = |m: &LogisticModel| {
            m.artifact()
                .coefficients
                .iter()
                .chain(std::iter::once(&m.artifact().intercept))
                .map(|v| v.to_bits())
                .collect::<Vec<_>>()
        };
        assert_eq!(bits(&loaded), bits(&trained));
    }

    #[test]
    fn test_corrupt_artifact_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_or_bootstrap(&path), Err(ModelError::Parse(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_reload_swaps_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let handle = ModelHandle::load_or_bootstrap(path.clone()).unwrap();
        assert_eq!(handle.provenance(), ModelProvenance::Bootstrap);

        let retrained = LogisticModel::new(
            [1.0, 0.5, 0.5, 0.5],
            -1.0,
            ModelProvenance::Feedback { samples: 40, positives: 18 },
        );
        save_artifact(&path, &retrained).unwrap();

        let snapshot = handle.current();
        let provenance = handle.reload().unwrap();
        assert_eq!(provenance.label(), "feedback");
        assert_eq!(handle.provenance(), provenance);
        // Snapshots taken before the swap keep scoring with the old model.
        assert_eq!(snapshot.provenance(), &ModelProvenance::Bootstrap);
    }

    #[test]
    fn test_reload_without_artifact_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ModelHandle::new(
            dir.path().join("model.json"),
            Arc::new(LogisticModel::new([0.0; 4], 0.0, ModelProvenance::Bootstrap)),
        );
        assert!(matches!(handle.reload(), Err(ModelError::Missing(_))));
        assert_eq!(handle.provenance(), ModelProvenance::Bootstrap);
    }
}
