//! Feature Builder: turns a (student, opportunity) pair into the fixed-order
//! vector consumed by the match classifier.
//!
//! The order of `FEATURE_NAMES` is part of the model contract: artifacts record
//! it and an artifact trained on a different order is rejected at load.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::opportunity::OpportunityRecord;
use crate::models::student::StudentSignals;

pub const FEATURE_COUNT: usize = 4;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "skill_match",
    "department_match",
    "year_eligible",
    "resume_score",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub skill_match: f64,      // 0.0 – 1.0
    pub department_match: f64, // 0 | 1
    pub year_eligible: f64,    // 0 | 1
    pub resume_score: f64,     // 0.0 – 1.0
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.skill_match,
            self.department_match,
            self.year_eligible,
            self.resume_score,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            skill_match: values[0],
            department_match: values[1],
            year_eligible: values[2],
            resume_score: values[3],
        }
    }
}

/// Lower-cases and trims each token, dropping blanks and duplicates.
pub fn normalize_skills<I, S>(skills: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    skills
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fraction of the opportunity's required skills the student holds.
/// No stated requirements scores 0.0, not 1.0.
pub fn skill_match(student_skills: &BTreeSet<String>, required_skills: &[String]) -> f64 {
    let required = normalize_skills(required_skills);
    if required.is_empty() || student_skills.is_empty() {
        return 0.0;
    }
    let student = normalize_skills(student_skills);
    let matched = required.intersection(&student).count();
    matched as f64 / required.len() as f64
}

pub fn build_features(student: &StudentSignals, opp: &OpportunityRecord) -> FeatureVector {
    let opp_department = opp.department.as_deref().unwrap_or("");
    let department_match =
        student.department.trim().to_lowercase() == opp_department.trim().to_lowercase();

    FeatureVector {
        skill_match: skill_match(&student.skills, &opp.required_skills),
        department_match: if department_match { 1.0 } else { 0.0 },
        year_eligible: if student.year >= opp.min_year { 1.0 } else { 0.0 },
        resume_score: student.resume_score,
    }
}
