//! Status changes applied atomically together with their audit log entry.

use serde::{Deserialize, Serialize};

use cloudservice_core::types::id::{PluginId, UserId};

use super::status::PluginStatus;
use crate::plugin_log::PluginAction;

/// A single lifecycle transition.
///
/// Stores apply the record update and append the log entry in one
/// transaction, and only if the record is still in `expected` status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Target plugin.
    pub plugin_id: PluginId,
    /// Status the record must currently hold.
    pub expected: PluginStatus,
    /// New status.
    pub status: PluginStatus,
    /// New `enabled` flag.
    pub enabled: bool,
    /// New error message (`Some` iff `status` is `error`).
    pub error_message: Option<String>,
    /// Set `activated_at` to the commit time.
    pub mark_activated: bool,
    /// Audit action written alongside.
    pub action: PluginAction,
    /// Acting user; `None` for system-triggered transitions.
    pub actor: Option<UserId>,
    /// Audit message.
    pub message: String,
}

impl StatusChange {
    /// Successful activation.
    pub fn activated(
        plugin_id: PluginId,
        expected: PluginStatus,
        actor: Option<UserId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id,
            expected,
            status: PluginStatus::Active,
            enabled: true,
            error_message: None,
            mark_activated: true,
            action: PluginAction::Activated,
            actor,
            message: message.into(),
        }
    }

    /// Deactivation of an active plugin.
    pub fn deactivated(
        plugin_id: PluginId,
        actor: Option<UserId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id,
            expected: PluginStatus::Active,
            status: PluginStatus::Inactive,
            enabled: false,
            error_message: None,
            mark_activated: false,
            action: PluginAction::Deactivated,
            actor,
            message: message.into(),
        }
    }

    /// Failed activation. An empty message is replaced so that an `error`
    /// record always explains itself.
    pub fn failed(
        plugin_id: PluginId,
        expected: PluginStatus,
        actor: Option<UserId>,
        error: impl Into<String>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "plugin failed without an error message".to_string();
        }
        Self {
            plugin_id,
            expected,
            status: PluginStatus::Error,
            enabled: false,
            error_message: Some(error.clone()),
            mark_activated: false,
            action: PluginAction::Error,
            actor,
            message: error,
        }
    }

    /// Whether this change respects the status machine and the
    /// enabled/status coupling.
    pub fn is_consistent(&self) -> bool {
        self.expected.can_transition_to(self.status)
            && (!self.enabled || self.status.permits_enabled())
            && (self.status == PluginStatus::Error) == self.error_message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_are_consistent() {
        let id = PluginId::new();
        assert!(StatusChange::activated(id, PluginStatus::Inactive, None, "ok").is_consistent());
        assert!(StatusChange::deactivated(id, None, "bye").is_consistent());
        assert!(StatusChange::failed(id, PluginStatus::Active, None, "boom").is_consistent());
    }

    #[test]
    fn test_failed_never_has_empty_message() {
        let change = StatusChange::failed(PluginId::new(), PluginStatus::Inactive, None, "  ");
        assert!(!change.error_message.as_deref().unwrap_or("").trim().is_empty());
        assert!(!change.enabled);
        assert_eq!(change.action, PluginAction::Error);
    }

    #[test]
    fn test_error_to_inactive_is_inconsistent() {
        let mut change = StatusChange::deactivated(PluginId::new(), None, "bye");
        change.expected = PluginStatus::Error;
        assert!(!change.is_consistent());
    }
}
