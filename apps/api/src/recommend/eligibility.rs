//! Eligibility Filter: the deterministic gate applied before any scoring.
//!
//! Department allow-list, minimum CGPA and maximum arrears are AND-ed. An
//! unknown CGPA or arrears count fails its gate when the gate is set.

use serde::Serialize;
use tracing::debug;

use crate::models::opportunity::OpportunityRecord;
use crate::models::student::StudentSignals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFailure {
    Department,
    Cgpa,
    Arrears,
}

/// Returns every gate the student fails for this opportunity, in gate order.
pub fn failed_gates(student: &StudentSignals, opp: &OpportunityRecord) -> Vec<GateFailure> {
    let mut failures = Vec::new();

    if !opp.allowed_departments.permits(&student.department) {
        failures.push(GateFailure::Department);
    }

    if let Some(min_cgpa) = opp.min_cgpa {
        match student.cgpa {
            Some(cgpa) if cgpa >= min_cgpa => {}
            _ => failures.push(GateFailure::Cgpa),
        }
    }

    if let Some(max_arrears) = opp.max_arrears {
        match student.arrears_count {
            Some(arrears) if arrears <= max_arrears => {}
            _ => failures.push(GateFailure::Arrears),
        }
    }

    failures
}

pub fn is_eligible(student: &StudentSignals, opp: &OpportunityRecord) -> bool {
    failed_gates(student, opp).is_empty()
}

/// Keeps eligible opportunities in their original order. Safe to apply to a
/// candidate list that was already filtered at the storage layer.
pub fn filter_eligible(
    student: &StudentSignals,
    candidates: Vec<OpportunityRecord>,
) -> Vec<OpportunityRecord> {
    candidates
        .into_iter()
        .filter(|opp| {
            let failures = failed_gates(student, opp);
            if !failures.is_empty() {
                debug!("Excluding opportunity {}: failed gates {:?}", opp.id, failures);
            }
            failures.is_empty()
        })
        .collect()
}
