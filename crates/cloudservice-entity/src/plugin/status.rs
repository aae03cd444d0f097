//! Plugin lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an installed plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plugin_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// Installed but not loaded into the process.
    Inactive,
    /// Loaded, with its hooks registered.
    Active,
    /// The last activation attempt failed.
    Error,
}

impl PluginStatus {
    /// Whether a lifecycle operation may move a plugin from `self` to `next`.
    ///
    /// `Active -> Active` is accepted so that a restart can re-affirm a
    /// plugin that was already active before the process went down.
    pub fn can_transition_to(&self, next: PluginStatus) -> bool {
        match (self, next) {
            (_, Self::Error) => true,
            (Self::Inactive | Self::Error | Self::Active, Self::Active) => true,
            (Self::Active, Self::Inactive) => true,
            (Self::Inactive, Self::Inactive) | (Self::Error, Self::Inactive) => false,
        }
    }

    /// Whether a record in this status may carry `enabled = true`.
    pub fn permits_enabled(&self) -> bool {
        !matches!(self, Self::Inactive)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PluginStatus {
    type Err = cloudservice_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "error" => Ok(Self::Error),
            _ => Err(cloudservice_core::AppError::validation(format!(
                "Invalid plugin status: '{s}'. Expected one of: inactive, active, error"
            ))),
        }
    }
}
