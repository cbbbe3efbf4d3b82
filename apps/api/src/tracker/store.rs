use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::tracker::{AttendanceRecord, RoundStatus};
use crate::tracker::TrackerError;

/// Persistence for tracker state. `AppState` carries an `Arc<dyn TrackerStore>`.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Creates the registration if missing. Returns whether a row was created.
    async fn register(
        &self,
        event_id: Uuid,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, TrackerError>;

    async fn attendance(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<AttendanceRecord>, TrackerError>;

    async fn set_attendance(
        &self,
        event_id: Uuid,
        email: &str,
        present: bool,
        attended_at: Option<DateTime<Utc>>,
    ) -> Result<(), TrackerError>;

    /// All registrations of an event, oldest first, then by email.
    async fn registrations_for(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, TrackerError>;

    async fn placement_exists(&self, placement_id: Uuid) -> Result<bool, TrackerError>;

    /// Inserts selections that do not exist yet. Returns how many were new.
    async fn record_selections(
        &self,
        placement_id: Uuid,
        round_number: i32,
        round_name: &str,
        emails: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, TrackerError>;

    async fn selections_for(&self, email: &str) -> Result<Vec<RoundStatus>, TrackerError>;
}

pub struct PgTrackerStore {
    pool: PgPool,
}

impl PgTrackerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackerStore for PgTrackerStore {
    async fn register(
        &self,
        event_id: Uuid,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_registrations (event_id, student_email, registered_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, student_email) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(email)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn attendance(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<AttendanceRecord>, TrackerError> {
        Ok(sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT event_id, student_email, is_present, attended_at, registered_at
            FROM event_registrations
            WHERE event_id = $1 AND student_email = $2
            "#,
        )
        .bind(event_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_attendance(
        &self,
        event_id: Uuid,
        email: &str,
        present: bool,
        attended_at: Option<DateTime<Utc>>,
    ) -> Result<(), TrackerError> {
        sqlx::query(
            r#"
            UPDATE event_registrations
            SET is_present = $3, attended_at = $4
            WHERE event_id = $1 AND student_email = $2
            "#,
        )
        .bind(event_id)
        .bind(email)
        .bind(present)
        .bind(attended_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn registrations_for(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, TrackerError> {
        Ok(sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT event_id, student_email, is_present, attended_at, registered_at
            FROM event_registrations
            WHERE event_id = $1
            ORDER BY registered_at, student_email
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn placement_exists(&self, placement_id: Uuid) -> Result<bool, TrackerError> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM placements WHERE id = $1)")
                .bind(placement_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn record_selections(
        &self,
        placement_id: Uuid,
        round_number: i32,
        round_name: &str,
        emails: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, TrackerError> {
        // Creation-only: an existing (placement, round, student) row is left untouched.
        let result = sqlx::query(
            r#"
            INSERT INTO placement_rounds
                (placement_id, round_number, round_name, student_email, notified_at)
            SELECT $1, $2, $3, email, $5
            FROM UNNEST($4::text[]) AS email
            ON CONFLICT (placement_id, round_number, student_email) DO NOTHING
            "#,
        )
        .bind(placement_id)
        .bind(round_number)
        .bind(round_name)
        .bind(emails)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn selections_for(&self, email: &str) -> Result<Vec<RoundStatus>, TrackerError> {
        Ok(sqlx::query_as::<_, RoundStatus>(
            r#"
            SELECT r.placement_id, p.company_name, p.title,
                   r.round_number, r.round_name, r.notified_at
            FROM placement_rounds r
            JOIN placements p ON p.id = r.placement_id
            WHERE r.student_email = $1
            ORDER BY r.notified_at, r.round_number
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?)
    }
}
