use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One student's selection into one round of a placement, as the student sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RoundStatus {
    pub placement_id: Uuid,
    pub company_name: String,
    pub title: String,
    pub round_number: i32,
    pub round_name: String,
    pub notified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub event_id: Uuid,
    pub student_email: String,
    pub is_present: bool,
    pub attended_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}
