//! Plugin audit log entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use cloudservice_core::types::id::{PluginId, PluginLogId, UserId};

/// Lifecycle action recorded in the plugin audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plugin_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PluginAction {
    /// Archive uploaded or plugin discovered.
    Uploaded,
    /// Plugin activated.
    Activated,
    /// Plugin deactivated.
    Deactivated,
    /// Activation failed.
    Error,
}

impl PluginAction {
    /// Return the action as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PluginAction {
    type Err = cloudservice_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploaded" => Ok(Self::Uploaded),
            "activated" => Ok(Self::Activated),
            "deactivated" => Ok(Self::Deactivated),
            "error" => Ok(Self::Error),
            _ => Err(cloudservice_core::AppError::validation(format!(
                "Invalid plugin action: '{s}'"
            ))),
        }
    }
}

/// An immutable audit entry for a plugin lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginLog {
    /// Unique entry identifier.
    pub id: PluginLogId,
    /// Plugin the entry refers to.
    pub plugin_id: PluginId,
    /// What happened.
    pub action: PluginAction,
    /// Acting user; `None` for system-triggered actions.
    pub user_id: Option<UserId>,
    /// Detail message.
    pub message: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Data required to append a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePluginLog {
    /// Plugin the entry refers to.
    pub plugin_id: PluginId,
    /// What happened.
    pub action: PluginAction,
    /// Acting user.
    pub user_id: Option<UserId>,
    /// Detail message.
    pub message: String,
}

/// Filter for listing log entries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PluginLogFilter {
    /// Restrict to one plugin.
    pub plugin_id: Option<PluginId>,
    /// Restrict to one action.
    pub action: Option<PluginAction>,
}

impl PluginLogFilter {
    /// Whether an entry passes this filter.
    pub fn matches(&self, log: &PluginLog) -> bool {
        self.plugin_id.is_none_or(|id| id == log.plugin_id)
            && self.action.is_none_or(|a| a == log.action)
    }
}
