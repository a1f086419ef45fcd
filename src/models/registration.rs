use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Attendee registration. At most one confirmed row exists per email;
/// unconfirmed rows for an email are superseded by a newer attempt.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub ticket_id: Uuid,
    pub transaction_id: Option<String>,
    pub confirmed: bool,
    pub attendance_confirmed: bool,
    pub attended: bool,
    pub created_at: DateTime<Utc>,
}

/// Singleton row (id = 1) gating the registration form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RegistrationsConfig {
    pub id: i32,
    pub open: bool,
    pub close_date: Option<DateTime<Utc>>,
}

impl RegistrationsConfig {
    /// The window is open when the flag is set and the close date, if any,
    /// has not passed.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.open && self.close_date.map_or(true, |close| now < close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(open: bool, close_in_minutes: Option<i64>) -> RegistrationsConfig {
        RegistrationsConfig {
            id: 1,
            open,
            close_date: close_in_minutes.map(|m| Utc::now() + Duration::minutes(m)),
        }
    }

    #[test]
    fn closed_flag_wins() {
        assert!(!config(false, None).is_open(Utc::now()));
        assert!(!config(false, Some(60)).is_open(Utc::now()));
    }

    #[test]
    fn open_without_close_date() {
        assert!(config(true, None).is_open(Utc::now()));
    }

    #[test]
    fn close_date_in_future_keeps_window_open() {
        assert!(config(true, Some(60)).is_open(Utc::now()));
    }

    #[test]
    fn past_close_date_closes_window() {
        assert!(!config(true, Some(-1)).is_open(Utc::now()));
    }
}
