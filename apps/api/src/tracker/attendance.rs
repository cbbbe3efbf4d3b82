use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::tracker::AttendanceRecord;
use crate::tracker::store::TrackerStore;
use crate::tracker::{normalize_email, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    /// The stored flag already matched; nothing was written.
    AlreadyMarked,
    Updated,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReport {
    pub outcome: AttendanceOutcome,
    pub message: String,
    pub record: AttendanceRecord,
}

/// Registered / present / absent counts for one event, with the records.
#[derive(Debug, Serialize)]
pub struct AttendanceSummary {
    pub event_id: Uuid,
    pub registered: usize,
    pub present: usize,
    pub absent: usize,
    pub registrations: Vec<AttendanceRecord>,
}

pub const ATTENDANCE_HEADERS: [&str; 4] = ["student_email", "registered_at", "attended", "attended_at"];

/// One row of the downloadable attendance sheet.
#[derive(Debug, PartialEq, Serialize)]
pub struct AttendanceLine {
    pub student_email: String,
    pub registered_at: String,
    pub attended: &'static str,
    pub attended_at: String,
}

impl From<&AttendanceRecord> for AttendanceLine {
    fn from(record: &AttendanceRecord) -> Self {
        AttendanceLine {
            student_email: record.student_email.clone(),
            registered_at: record.registered_at.to_rfc3339(),
            attended: if record.is_present { "YES" } else { "NO" },
            attended_at: record
                .attended_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

impl AttendanceSummary {
    pub fn lines(&self) -> Vec<AttendanceLine> {
        self.registrations.iter().map(AttendanceLine::from).collect()
    }
}

/// Decides the transition for a mark request against the stored record.
/// Returns the new `attended_at` when a write is needed.
pub fn transition(
    current: &AttendanceRecord,
    present: bool,
    now: DateTime<Utc>,
) -> (AttendanceOutcome, Option<DateTime<Utc>>) {
    if current.is_present == present {
        return (AttendanceOutcome::AlreadyMarked, current.attended_at);
    }
    let attended_at = if present { Some(now) } else { None };
    (AttendanceOutcome::Updated, attended_at)
}

/// Registers a student for an event. Repeat registrations are no-ops.
pub async fn register_for_event(
    store: &dyn TrackerStore,
    event_id: Uuid,
    raw_email: &str,
) -> Result<bool, TrackerError> {
    let email =
        normalize_email(raw_email).ok_or_else(|| TrackerError::InvalidEmail(raw_email.to_string()))?;
    let created = store.register(event_id, &email, Utc::now()).await?;
    if created {
        info!("Registered {email} for event {event_id}");
    }
    Ok(created)
}

/// Marks a registered student present or absent.
///
/// Idempotent: re-marking with the current value reports `AlreadyMarked` and
/// leaves the record untouched. Marking absent clears `attended_at`.
pub async fn mark_attendance(
    store: &dyn TrackerStore,
    event_id: Uuid,
    raw_email: &str,
    present: bool,
) -> Result<AttendanceReport, TrackerError> {
    let email =
        normalize_email(raw_email).ok_or_else(|| TrackerError::InvalidEmail(raw_email.to_string()))?;
    let current = store
        .attendance(event_id, &email)
        .await?
        .ok_or_else(|| TrackerError::NotRegistered {
            event_id,
            email: email.clone(),
        })?;

    let (outcome, attended_at) = transition(&current, present, Utc::now());
    let label = if present { "present" } else { "absent" };

    let (message, record) = match outcome {
        AttendanceOutcome::AlreadyMarked => (format!("Already marked {label}"), current),
        AttendanceOutcome::Updated => {
            store
                .set_attendance(event_id, &email, present, attended_at)
                .await?;
            info!("Marked {email} {label} for event {event_id}");
            (
                format!("Marked {label}"),
                AttendanceRecord {
                    is_present: present,
                    attended_at,
                    ..current
                },
            )
        }
    };

    Ok(AttendanceReport {
        outcome,
        message,
        record,
    })
}

pub async fn list_registrations(
    store: &dyn TrackerStore,
    event_id: Uuid,
) -> Result<Vec<AttendanceRecord>, TrackerError> {
    store.registrations_for(event_id).await
}

/// Counts an event's registrations. An event nobody registered for reports zeros.
pub async fn attendance_summary(
    store: &dyn TrackerStore,
    event_id: Uuid,
) -> Result<AttendanceSummary, TrackerError> {
    let registrations = store.registrations_for(event_id).await?;
    let present = registrations.iter().filter(|r| r.is_present).count();
    Ok(AttendanceSummary {
        event_id,
        registered: registrations.len(),
        present,
        absent: registrations.len() - present,
        registrations,
    })
}
