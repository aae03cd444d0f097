//! Access token payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudservice_core::types::id::UserId;
use cloudservice_entity::user::UserRole;

/// Registered claims (`sub`, `iss`, `iat`, `exp`) plus the caller's role
/// and display name. Plugin administration only looks at `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: UserRole,
    pub username: String,
    pub iss: String,
    /// Unix seconds.
    pub iat: i64,
    /// Unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        self.sub
    }

    /// `exp` as a timestamp, or `None` if it is out of chrono's range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
