//! Eligible-students roster for a placement notice, as downloaded by staff.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::models::opportunity::OpportunityRecord;
use crate::models::student::StudentRow;
use crate::recommend::eligibility::failed_gates;
use crate::recommend::scorer::MatchScorer;

pub const ROSTER_HEADERS: [&str; 5] = ["email", "department", "cgpa", "arrears_count", "match_score"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleStudent {
    pub email: String,
    pub department: String,
    pub cgpa: Option<f64>,
    pub arrears_count: Option<u32>,
    pub match_score: f64,
}

/// Students passing every gate of `opp`, highest match first, then by email.
pub fn eligible_students(
    scorer: &MatchScorer,
    opp: &OpportunityRecord,
    students: &[StudentRow],
) -> Vec<EligibleStudent> {
    let mut roster: Vec<EligibleStudent> = students
        .iter()
        .filter_map(|row| {
            let signals = row.signals();
            let failures = failed_gates(&signals, opp);
            if !failures.is_empty() {
                debug!("{} not eligible for {}: {:?}", row.email, opp.id, failures);
                return None;
            }
            Some(EligibleStudent {
                email: row.email.clone(),
                match_score: scorer.score(&signals, opp),
                department: signals.department,
                cgpa: signals.cgpa,
                arrears_count: signals.arrears_count,
            })
        })
        .collect();

    roster.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.email.cmp(&b.email))
    });
    roster
}
