//! Ranker/Merger: scores eligible opportunities, merges upstream reasons and
//! sorts the result.
//!
//! External partial scores (e.g. from the keyword/tag matcher upstream) are
//! advisory: they are echoed back but never blended into `score`.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::opportunity::OpportunityRecord;
use crate::models::student::StudentSignals;
use crate::recommend::eligibility::filter_eligible;
use crate::recommend::reasons::ReasonSet;
use crate::recommend::scorer::MatchScorer;

/// Partial score and reasons supplied by an upstream stage for one opportunity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalScore {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub opportunity_id: String,
    pub score: f64,
    pub reasons: ReasonSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_score: Option<f64>,
}

/// Ranks opportunities that are already known to be eligible.
///
/// Sorted by score descending; equal scores keep input order.
pub fn rank(
    scorer: &MatchScorer,
    student: &StudentSignals,
    eligible: &[OpportunityRecord],
    external: &HashMap<String, ExternalScore>,
) -> Vec<ScoreResult> {
    let mut results: Vec<ScoreResult> = eligible
        .iter()
        .map(|opp| {
            let outcome = scorer.evaluate(student, opp);
            let mut reasons = outcome.reasons;
            let upstream = external.get(&opp.id);
            if let Some(upstream) = upstream {
                reasons.merge(upstream.reasons.iter().cloned());
            }
            ScoreResult {
                opportunity_id: opp.id.clone(),
                score: outcome.score,
                reasons,
                external_score: upstream.and_then(|u| u.score),
            }
        })
        .collect();

    // Vec::sort_by is stable, which keeps ties in candidate-source order.
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results
}

/// Eligibility filter followed by ranking; the entry point for request paths.
pub fn recommend(
    scorer: &MatchScorer,
    student: &StudentSignals,
    candidates: Vec<OpportunityRecord>,
    external: &HashMap<String, ExternalScore>,
    limit: Option<usize>,
) -> Vec<ScoreResult> {
    let eligible = filter_eligible(student, candidates);
    let mut ranked = rank(scorer, student, &eligible, external);
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}
