use serde::{Deserialize, Serialize};

use crate::recommend::features::FeatureVector;

pub const STRONG_SKILL_REASON: &str = "Strong skill alignment";
pub const PROFILE_RELEVANCE_REASON: &str = "Profile relevance";
pub const YEAR_REASON: &str = "Meets year requirement";
pub const GROWTH_REASON: &str = "Growth potential";
/// Attached when the classifier could not produce a score.
pub const FALLBACK_REASON: &str = "Recommended from your overall profile";

const STRONG_SKILL_THRESHOLD: f64 = 0.6;

/// Insertion-ordered set of human-readable reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ReasonSet(Vec<String>);

impl ReasonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reason unless an identical string is already present.
    pub fn insert(&mut self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if reason.trim().is_empty() || self.0.contains(&reason) {
            return false;
        }
        self.0.push(reason);
        true
    }

    pub fn merge<I, S>(&mut self, reasons: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reason in reasons {
            self.insert(reason);
        }
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.0.iter().any(|r| r == reason)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ReasonSet {
    fn from(reasons: Vec<String>) -> Self {
        let mut set = Self::new();
        set.merge(reasons);
        set
    }
}

impl From<ReasonSet> for Vec<String> {
    fn from(set: ReasonSet) -> Self {
        set.0
    }
}

/// One reason per feature group, derived from the features alone.
pub fn reasons_for(features: &FeatureVector) -> ReasonSet {
    let mut reasons = ReasonSet::new();
    reasons.insert(if features.skill_match > STRONG_SKILL_THRESHOLD {
        STRONG_SKILL_REASON
    } else {
        PROFILE_RELEVANCE_REASON
    });
    reasons.insert(if features.year_eligible >= 1.0 {
        YEAR_REASON
    } else {
        GROWTH_REASON
    });
    reasons
}
