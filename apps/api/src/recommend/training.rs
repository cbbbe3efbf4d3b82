//! Offline training for the match model.
//!
//! Logistic regression with L2 penalty (C = 1.0, intercept unpenalized) fitted
//! by full-batch gradient descent from a zero start. No randomness is involved,
//! so the same samples in the same order always produce the same artifact.
//! Only the `retrain` / `bootstrap-model` commands and first-boot bootstrap
//! call into this module; request handlers never do.

use std::path::Path;

use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

use crate::models::opportunity::{AllowedDepartments, OpportunityRecord};
use crate::models::student::signals_from_profile;
use crate::recommend::features::{build_features, FeatureVector, FEATURE_COUNT};
use crate::recommend::model::{save_artifact, sigmoid, LogisticModel, ModelError, ModelProvenance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub outcome: bool,
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Inverse regularization strength.
    pub c: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iterations: 10_000,
            tolerance: 1e-9,
        }
    }
}

/// Synthetic "common sense" priors used until real feedback exists.
/// Features: [skill_match, department_match, year_eligible, resume_score]
const BOOTSTRAP_SET: [([f64; FEATURE_COUNT], bool); 4] = [
    ([1.0, 1.0, 1.0, 0.9], true),  // perfect match
    ([0.0, 0.0, 0.0, 0.1], false), // no match
    ([0.5, 1.0, 1.0, 0.6], true),  // partial match
    ([0.2, 0.0, 1.0, 0.4], false), // weak match
];

pub fn bootstrap_samples() -> Vec<TrainingSample> {
    BOOTSTRAP_SET
        .iter()
        .map(|(values, outcome)| TrainingSample {
            features: FeatureVector::from_array(*values),
            outcome: *outcome,
        })
        .collect()
}

pub fn bootstrap_model() -> Result<LogisticModel, ModelError> {
    train(
        &bootstrap_samples(),
        ModelProvenance::Bootstrap,
        &TrainingConfig::default(),
    )
}

pub fn train(
    samples: &[TrainingSample],
    provenance: ModelProvenance,
    config: &TrainingConfig,
) -> Result<LogisticModel, ModelError> {
    if samples.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    let positives = samples.iter().filter(|s| s.outcome).count();
    if positives == 0 || positives == samples.len() {
        return Err(ModelError::SingleClass);
    }

    let n = samples.len() as f64;
    let rows: Vec<([f64; FEATURE_COUNT], f64)> = samples
        .iter()
        .map(|s| (s.features.to_array(), if s.outcome { 1.0 } else { 0.0 }))
        .collect();

    let mut weights = [0.0_f64; FEATURE_COUNT];
    let mut intercept = 0.0_f64;

    for _ in 0..config.max_iterations {
        let mut grad_w = [0.0_f64; FEATURE_COUNT];
        let mut grad_b = 0.0_f64;

        for (x, y) in &rows {
            let z = intercept + weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
            let residual = sigmoid(z) - y;
            for (g, v) in grad_w.iter_mut().zip(x) {
                *g += residual * v;
            }
            grad_b += residual;
        }

        let mut largest = (grad_b / n).abs();
        for (g, w) in grad_w.iter_mut().zip(&weights) {
            *g = *g / n + w / (config.c * n);
            largest = largest.max(g.abs());
        }

        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= config.learning_rate * g;
        }
        intercept -= config.learning_rate * grad_b / n;

        if largest < config.tolerance {
            break;
        }
    }

    Ok(LogisticModel::new(weights, intercept, provenance))
}

// ────────────────────────────────────────────────────────────────────────────
// Feedback log → training matrix
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct FeedbackTrainingRow {
    value: i16,
    department: Option<String>,
    profile: Value,
    placement_department: Option<String>,
    required_skills: Vec<String>,
    min_year: i32,
}

impl FeedbackTrainingRow {
    fn to_sample(&self) -> TrainingSample {
        let student = signals_from_profile(self.department.as_deref(), self.profile.clone());
        let opportunity = OpportunityRecord {
            id: String::new(),
            required_skills: self.required_skills.clone(),
            department: self.placement_department.clone(),
            min_year: self.min_year.max(0) as u32,
            allowed_departments: AllowedDepartments::open(),
            min_cgpa: None,
            max_arrears: None,
        };
        TrainingSample {
            features: build_features(&student, &opportunity),
            outcome: self.value > 0,
        }
    }
}

/// Rebuilds the training matrix from the feedback log. Feedback on
/// opportunities that are not stored placements cannot be featurized and is
/// skipped. Rows come back in log order so the matrix is reproducible.
pub async fn load_feedback_samples(pool: &PgPool) -> Result<Vec<TrainingSample>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FeedbackTrainingRow>(
        r#"
        SELECT f.value, s.department, s.profile,
               p.department AS placement_department, p.required_skills, p.min_year
        FROM ml_feedback f
        JOIN students s ON s.email = f.email
        JOIN placements p ON p.id::text = f.opportunity_id
        ORDER BY f.created_at, f.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ml_feedback")
        .fetch_one(pool)
        .await?;
    let skipped = total - rows.len() as i64;
    if skipped > 0 {
        warn!("Skipped {skipped} feedback entries without a stored student or placement");
    }

    Ok(rows.iter().map(FeedbackTrainingRow::to_sample).collect())
}

/// Trains on the feedback log and atomically publishes the artifact at `path`.
/// The running service picks it up on restart or reload.
pub async fn retrain_from_feedback(
    pool: &PgPool,
    path: &Path,
) -> anyhow::Result<ModelProvenance> {
    let samples = load_feedback_samples(pool).await?;
    let positives = samples.iter().filter(|s| s.outcome).count();
    info!(
        "Retraining match model on {} samples ({} positive)",
        samples.len(),
        positives
    );

    let provenance = ModelProvenance::Feedback {
        samples: samples.len(),
        positives,
    };
    let model = train(&samples, provenance.clone(), &TrainingConfig::default())?;
    save_artifact(path, &model)?;
    info!("Published retrained match model to {}", path.display());
    Ok(provenance)
}
