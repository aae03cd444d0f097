//! Caller roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cloudservice_core::AppError;

/// Role claim of an access token. Only administrators may manage plugins;
/// any authenticated caller may request previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("admin") {
            Ok(Self::Admin)
        } else if s.eq_ignore_ascii_case("user") {
            Ok(Self::User)
        } else {
            Err(AppError::validation(format!(
                "Unknown role '{s}', expected 'admin' or 'user'"
            )))
        }
    }
}
