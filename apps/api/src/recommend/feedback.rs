//! Feedback log: append-only record of how students engaged with
//! recommended opportunities. Consumed only by the offline `retrain` command.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

/// Actions that count as a positive outcome for training.
pub const POSITIVE_ACTIONS: [&str; 3] = ["applied", "liked", "clicked"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub email: String,
    pub opportunity_id: String,
    pub action: String,
    pub value: i16, // 0 | 1
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn new(email: &str, opportunity_id: &str, action: &str, timestamp: DateTime<Utc>) -> Self {
        let action = action.trim().to_lowercase();
        let value = if POSITIVE_ACTIONS.contains(&action.as_str()) {
            1
        } else {
            0
        };
        Self {
            email: email.trim().to_lowercase(),
            opportunity_id: opportunity_id.trim().to_string(),
            action,
            value,
            timestamp,
        }
    }
}

#[async_trait]
pub trait FeedbackLog: Send + Sync {
    async fn append(&self, entry: &FeedbackEntry) -> anyhow::Result<()>;
}

pub struct PgFeedbackLog {
    pool: PgPool,
}

impl PgFeedbackLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackLog for PgFeedbackLog {
    async fn append(&self, entry: &FeedbackEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ml_feedback (email, opportunity_id, action, value, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.email)
        .bind(&entry.opportunity_id)
        .bind(&entry.action)
        .bind(entry.value)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Appends one feedback entry. Returns `false` when the write fails; the
/// failure is logged and not retried.
pub async fn record_feedback(
    log: &dyn FeedbackLog,
    email: &str,
    opportunity_id: &str,
    action: &str,
) -> bool {
    let entry = FeedbackEntry::new(email, opportunity_id, action, Utc::now());
    match log.append(&entry).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                "Failed to record feedback '{}' on {} for {}: {e:?}",
                entry.action, entry.opportunity_id, entry.email
            );
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryFeedbackLog, UnavailableFeedbackLog};
    use super::*;

    #[test]
    fn test_positive_actions_score_one() {
        for action in ["applied", "liked", "clicked", " Applied "] {
            assert_eq!(FeedbackEntry::new("a@kongu.edu", "job-1", action, Utc::now()).value, 1);
        }
    }

    #[test]
    fn test_other_actions_score_zero() {
        for action in ["dismissed", "viewed", ""] {
            assert_eq!(FeedbackEntry::new("a@kongu.edu", "job-1", action, Utc::now()).value, 0);
        }
    }

    #[test]
    fn test_entry_normalizes_fields() {
        let entry = FeedbackEntry::new(" Asha@Kongu.edu ", " job-7 ", "LIKED", Utc::now());
        assert_eq!(entry.email, "asha@kongu.edu");
        assert_eq!(entry.opportunity_id, "job-7");
        assert_eq!(entry.action, "liked");
    }

    #[tokio::test]
    async fn test_record_feedback_appends() {
        let log = MemoryFeedbackLog::default();
        assert!(record_feedback(&log, "a@kongu.edu", "job-1", "applied").await);
        assert!(record_feedback(&log, "a@kongu.edu", "job-1", "applied").await);
        let entries = log.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, 1);
    }

    #[tokio::test]
    async fn test_record_feedback_reports_failure() {
        assert!(!record_feedback(&UnavailableFeedbackLog, "a@kongu.edu", "job-1", "clicked").await);
    }
}
