//! Match Scorer: learned probability of fit for one (student, opportunity) pair.
//!
//! The classifier is injected at construction. A prediction error is a typed
//! branch: it is logged and the fixed fallback score is returned with a
//! generic reason, so callers always get a score in [0, 1].

use std::sync::Arc;

use tracing::warn;

use crate::models::opportunity::OpportunityRecord;
use crate::models::student::StudentSignals;
use crate::recommend::features::{build_features, FeatureVector};
use crate::recommend::model::{Classifier, ScoreError};
use crate::recommend::reasons::{reasons_for, ReasonSet, FALLBACK_REASON};

pub const FALLBACK_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub score: f64,
    pub reasons: ReasonSet,
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct MatchScorer {
    classifier: Arc<dyn Classifier>,
}

impl MatchScorer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        self.classifier.predict_proba(features)
    }

    pub fn score(&self, student: &StudentSignals, opp: &OpportunityRecord) -> f64 {
        self.evaluate(student, opp).score
    }

    pub fn evaluate(&self, student: &StudentSignals, opp: &OpportunityRecord) -> MatchOutcome {
        let features = build_features(student, opp);
        let mut reasons = reasons_for(&features);

        let prediction = self.predict(&features).and_then(|p| {
            if p.is_finite() {
                Ok(p)
            } else {
                Err(ScoreError::NonFiniteOutput)
            }
        });

        match prediction {
            Ok(p) => MatchOutcome {
                score: round_score(p),
                reasons,
                used_fallback: false,
            },
            Err(e) => {
                warn!(
                    "Match model ({}) failed for opportunity {}: {e}; using fallback score",
                    self.classifier.provenance().label(),
                    opp.id
                );
                reasons.insert(FALLBACK_REASON);
                MatchOutcome {
                    score: FALLBACK_SCORE,
                    reasons,
                    used_fallback: true,
                }
            }
        }
    }
}

/// Clamps to [0, 1] and rounds to three decimals.
pub fn round_score(p: f64) -> f64 {
    (p.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::recommend::model::ModelProvenance;

    /// Classifier that always fails, for exercising the fallback branch.
    pub struct FailingClassifier {
        provenance: ModelProvenance,
    }

    impl FailingClassifier {
        pub fn new() -> Self {
            Self {
                provenance: ModelProvenance::Bootstrap,
            }
        }
    }

    impl Classifier for FailingClassifier {
        fn predict_proba(&self, _features: &FeatureVector) -> Result<f64, ScoreError> {
            Err(ScoreError::NonFiniteOutput)
        }

        fn provenance(&self) -> &ModelProvenance {
            &self.provenance
        }
    }

    /// Classifier returning a fixed (possibly out-of-range) value.
    pub struct ConstantClassifier(pub f64, pub ModelProvenance);

    impl Classifier for ConstantClassifier {
        fn predict_proba(&self, _features: &FeatureVector) -> Result<f64, ScoreError> {
            Ok(self.0)
        }

        fn provenance(&self) -> &ModelProvenance {
            &self.1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ConstantClassifier, FailingClassifier};
    use super::*;
    use crate::models::opportunity::AllowedDepartments;
    use crate::recommend::features::normalize_skills;
    use crate::recommend::model::ModelProvenance;
    use crate::recommend::reasons::{GROWTH_REASON, STRONG_SKILL_REASON, YEAR_REASON};
    use crate::recommend::training::bootstrap_model;

    fn student() -> StudentSignals {
        StudentSignals {
            skills: normalize_skills(["python", "ml"]),
            department: "CS".to_string(),
            year: 3,
            resume_score: 0.85,
            cgpa: None,
            arrears_count: None,
        }
    }

    fn opportunity(id: &str, skills: &[&str], allowed: &[&str], min_year: u32) -> OpportunityRecord {
        OpportunityRecord {
            id: id.to_string(),
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            department: None,
            min_year,
            allowed_departments: AllowedDepartments::from_admin_input(allowed),
            min_cgpa: None,
            max_arrears: None,
        }
    }

    #[test]
    fn test_failing_classifier_falls_back() {
        let scorer = MatchScorer::new(Arc::new(FailingClassifier::new()));
        let outcome = scorer.evaluate(&student(), &opportunity("a", &["python"], &[], 3));
        assert_eq!(outcome.score, FALLBACK_SCORE);
        assert!(outcome.used_fallback);
        assert!(outcome.reasons.contains(FALLBACK_REASON));
        assert!(outcome.reasons.contains(STRONG_SKILL_REASON));
    }

    #[test]
    fn test_non_finite_prediction_falls_back() {
        for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let scorer = MatchScorer::new(Arc::new(ConstantClassifier(raw, ModelProvenance::Bootstrap)));
            let outcome = scorer.evaluate(&student(), &opportunity("a", &["python"], &[], 3));
            assert_eq!(outcome.score, FALLBACK_SCORE);
            assert!(outcome.used_fallback);
            assert!(outcome.reasons.contains(FALLBACK_REASON));
        }
    }

    #[test]
    fn test_score_always_in_unit_interval() {
        for raw in [-3.0, 0.0, 0.42, 1.0, 7.5, f64::NAN] {
            let scorer = MatchScorer::new(Arc::new(ConstantClassifier(raw, ModelProvenance::Bootstrap)));
            let score = scorer.score(&student(), &opportunity("a", &[], &[], 0));
            assert!((0.0..=1.0).contains(&score), "score was {score}");
        }
    }

    #[test]
    fn test_score_rounded_to_three_decimals() {
        let scorer = MatchScorer::new(Arc::new(ConstantClassifier(0.123456, ModelProvenance::Bootstrap)));
        assert_eq!(scorer.score(&student(), &opportunity("a", &[], &[], 0)), 0.123);
        assert_eq!(round_score(0.9996), 1.0);
    }

    #[test]
    fn test_reasons_do_not_depend_on_score() {
        let opp = opportunity("a", &["python", "ml"], &[], 4);
        let low = MatchScorer::new(Arc::new(ConstantClassifier(0.01, ModelProvenance::Bootstrap)));
        let high = MatchScorer::new(Arc::new(ConstantClassifier(0.99, ModelProvenance::Bootstrap)));
        let low = low.evaluate(&student(), &opp);
        let high = high.evaluate(&student(), &opp);
        assert_eq!(low.reasons, high.reasons);
        assert_eq!(low.reasons.as_slice(), &[STRONG_SKILL_REASON, GROWTH_REASON]);
    }

    #[test]
    fn test_bootstrap_prefers_matching_opportunity() {
        let scorer = MatchScorer::new(Arc::new(bootstrap_model().unwrap()));
        let good = opportunity("ml-intern", &["python", "ml"], &[], 3);
        let poor = opportunity("site-engineer", &["autocad"], &["Civil"], 4);

        let good = scorer.evaluate(&student(), &good);
        let poor = scorer.evaluate(&student(), &poor);
        assert!(good.score > poor.score, "{} vs {}", good.score, poor.score);
        assert_eq!(good.reasons.as_slice(), &[STRONG_SKILL_REASON, YEAR_REASON]);
        assert!(!good.used_fallback);
    }
}
