use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::tracker::RoundStatus;
use crate::tracker::store::TrackerStore;
use crate::tracker::{normalize_email, TrackerError};

#[derive(Debug, Deserialize)]
pub struct RoundUpload {
    pub round_number: i32,
    #[serde(default)]
    pub round_name: String,
    pub student_emails: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RoundUploadSummary {
    pub placement_id: Uuid,
    pub round_number: i32,
    pub round_name: String,
    pub recorded: usize,
    pub already_recorded: usize,
    pub rejected_emails: Vec<String>,
}

/// Validated upload: round name resolved, emails normalized and deduplicated.
#[derive(Debug, PartialEq)]
struct RoundSelection {
    round_number: i32,
    round_name: String,
    emails: Vec<String>,
    rejected: Vec<String>,
}

fn prepare(upload: &RoundUpload) -> Result<RoundSelection, TrackerError> {
    if upload.round_number < 1 {
        return Err(TrackerError::InvalidRound(upload.round_number));
    }
    let round_name = match upload.round_name.trim() {
        "" => format!("Round {}", upload.round_number),
        name => name.to_string(),
    };

    let mut emails = BTreeSet::new();
    let mut rejected = Vec::new();
    for raw in &upload.student_emails {
        if raw.trim().is_empty() {
            continue;
        }
        match normalize_email(raw) {
            Some(email) => {
                emails.insert(email);
            }
            None => rejected.push(raw.trim().to_string()),
        }
    }
    if emails.is_empty() {
        return Err(TrackerError::EmptySelection);
    }

    Ok(RoundSelection {
        round_number: upload.round_number,
        round_name,
        emails: emails.into_iter().collect(),
        rejected,
    })
}

/// Records the students advancing to a placement round.
///
/// Creation-only per (placement, round, student): re-uploading the same list
/// changes nothing and reports the rows as already recorded.
pub async fn upload_round_selections(
    store: &dyn TrackerStore,
    placement_id: Uuid,
    upload: &RoundUpload,
) -> Result<RoundUploadSummary, TrackerError> {
    let selection = prepare(upload)?;
    if !store.placement_exists(placement_id).await? {
        return Err(TrackerError::PlacementNotFound(placement_id));
    }
    if !selection.rejected.is_empty() {
        warn!(
            "Skipping {} malformed emails in round {} upload for placement {placement_id}",
            selection.rejected.len(),
            selection.round_number
        );
    }

    let recorded = store
        .record_selections(
            placement_id,
            selection.round_number,
            &selection.round_name,
            &selection.emails,
            Utc::now(),
        )
        .await?;

    info!(
        "Placement {placement_id} {}: {recorded} new selections of {}",
        selection.round_name,
        selection.emails.len()
    );

    Ok(RoundUploadSummary {
        placement_id,
        round_number: selection.round_number,
        already_recorded: selection.emails.len() - recorded,
        round_name: selection.round_name,
        recorded,
        rejected_emails: selection.rejected,
    })
}

/// Every round selection held by the student, across all placements.
pub async fn student_status(
    store: &dyn TrackerStore,
    raw_email: &str,
) -> Result<Vec<RoundStatus>, TrackerError> {
    let email =
        normalize_email(raw_email).ok_or_else(|| TrackerError::InvalidEmail(raw_email.to_string()))?;
    store.selections_for(&email).await
}
