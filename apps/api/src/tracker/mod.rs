// Round/attendance tracker.
// Two independent axes per (opportunity, student): event attendance and
// placement round selection. Both are written by administrators only.

pub mod attendance;
pub mod handlers;
pub mod rounds;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Student {email} is not registered for event {event_id}")]
    NotRegistered { event_id: Uuid, email: String },

    #[error("Placement {0} not found")]
    PlacementNotFound(Uuid),

    #[error("Round number must be at least 1, got {0}")]
    InvalidRound(i32),

    #[error("Round upload contains no valid student emails")]
    EmptySelection,

    #[error("Invalid student email: '{0}'")]
    InvalidEmail(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Trims and lower-cases an email; `None` if it cannot be an address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Kavin.S@Kongu.EDU "),
            Some("kavin.s@kongu.edu".to_string())
        );
        assert_eq!(normalize_email("22cse101"), None);
        assert_eq!(normalize_email("@kongu.edu"), None);
        assert_eq!(normalize_email("a b@kongu.edu"), None);
    }
}
