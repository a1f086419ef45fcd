use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Access level granting admin dashboard rights. 0 is elevated in this
/// system's convention.
pub const ACCESS_LEVEL_ADMIN: i32 = 0;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verified: bool,
    pub access_level: i32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.access_level == ACCESS_LEVEL_ADMIN
    }
}
