use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Login session backing the signed cookie. Fixed 7-day TTL from creation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}

/// One-shot email verification token. Consuming it (matching id, not
/// expired) flips the owning user's verified flag.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}

/// Password reset token. Consumed by matching id + numeric code before
/// expiry.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub code: String,
}

impl AuthSession {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.expired && self.expires_at > now
    }
}

impl VerificationSession {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.expired && self.expires_at > now
    }
}

impl PasswordResetRequest {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.expired && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expired: bool, ttl_minutes: i64) -> AuthSession {
        let now = Utc::now();
        AuthSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
            expired,
        }
    }

    #[test]
    fn live_session_is_valid() {
        assert!(session(false, 10).is_valid(Utc::now()));
    }

    #[test]
    fn expired_flag_invalidates_even_before_expiry() {
        assert!(!session(true, 10).is_valid(Utc::now()));
    }

    #[test]
    fn past_expiry_invalidates() {
        assert!(!session(false, -1).is_valid(Utc::now()));
    }
}
