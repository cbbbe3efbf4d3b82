use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::recommend::features::normalize_skills;

/// Resume score assumed when the profile store has no usable value.
pub const DEFAULT_RESUME_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentRow {
    pub email: String,
    pub department: Option<String>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
}

impl StudentRow {
    /// Builds a fresh scoring snapshot. The department column wins over any
    /// department echoed inside the profile document.
    pub fn signals(&self) -> StudentSignals {
        signals_from_profile(self.department.as_deref(), self.profile.clone())
    }
}

pub fn signals_from_profile(department: Option<&str>, profile: Value) -> StudentSignals {
    let mut raw = RawStudentProfile::from_json(profile);
    if let Some(department) = department {
        raw.department = Value::String(department.to_string());
    }
    raw.into_signals()
}

/// Profile document as it arrives from the profile store or an API caller.
///
/// Every field is kept as loose JSON so that malformed values degrade to
/// "unknown" instead of rejecting the whole profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStudentProfile {
    #[serde(default)]
    pub skills: Value,
    #[serde(default)]
    pub department: Value,
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub resume_score: Value,
    #[serde(default)]
    pub cgpa: Value,
    #[serde(default, alias = "arrears_history")]
    pub arrears_count: Value,
}

impl RawStudentProfile {
    pub fn from_json(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Gated fields (CGPA, arrears) become `None` when malformed, which fails
    /// their gates. Non-gated fields (year, resume score) fall back to defaults.
    pub fn into_signals(self) -> StudentSignals {
        let skills = match &self.skills {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>(),
            Value::String(csv) => csv.split(',').collect(),
            _ => Vec::new(),
        };

        StudentSignals {
            skills: normalize_skills(skills),
            department: self
                .department
                .as_str()
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            year: whole_number(&self.year).unwrap_or(0),
            resume_score: number(&self.resume_score)
                .filter(|s| (0.0..=1.0).contains(s))
                .unwrap_or(DEFAULT_RESUME_SCORE),
            cgpa: number(&self.cgpa).filter(|c| *c >= 0.0),
            arrears_count: whole_number(&self.arrears_count),
        }
    }
}

/// Immutable per-request snapshot of the signals the recommender consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSignals {
    pub skills: BTreeSet<String>,
    pub department: String,
    pub year: u32,
    pub resume_score: f64,
    pub cgpa: Option<f64>,
    pub arrears_count: Option<u32>,
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn whole_number(value: &Value) -> Option<u32> {
    number(value)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
}
