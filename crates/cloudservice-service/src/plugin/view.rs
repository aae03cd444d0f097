//! Caller-facing plugin representation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cloudservice_core::types::id::{PluginId, UserId};
use cloudservice_entity::plugin::{Plugin, PluginPosition, PluginStatus};

/// A plugin record joined with this process's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct PluginView {
    pub id: PluginId,
    pub name: String,
    pub slug: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub module_name: String,
    pub entry_point: String,
    pub is_local: bool,
    pub enabled: bool,
    pub status: PluginStatus,
    pub error_message: Option<String>,
    /// Hook points declared in the manifest.
    pub declared_hooks: Vec<String>,
    pub settings: serde_json::Value,
    /// Whether the manifest declares a settings form.
    pub has_settings: bool,
    /// JSON Schema of the settings object, when declared.
    pub settings_schema: Option<serde_json::Value>,
    pub position: PluginPosition,
    pub installed_by: Option<UserId>,
    pub uploaded_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Whether the module is loaded in the process that served the request.
    pub loaded: bool,
    /// Hook registrations this plugin owns in that process.
    pub hook_registrations: usize,
}

impl PluginView {
    /// Builds a view from a record and its runtime state.
    pub fn new(plugin: Plugin, loaded: bool, hook_registrations: usize) -> Self {
        let manifest = plugin.manifest.0;
        Self {
            id: plugin.id,
            name: plugin.name,
            slug: plugin.slug,
            version: plugin.version,
            author: plugin.author,
            description: plugin.description,
            module_name: plugin.module_name,
            entry_point: manifest.entry_point.clone(),
            is_local: plugin.is_local,
            enabled: plugin.enabled,
            status: plugin.status,
            error_message: plugin.error_message,
            has_settings: manifest.has_settings(),
            settings_schema: manifest.settings_schema().cloned(),
            declared_hooks: manifest.hooks.into_keys().collect(),
            settings: plugin.settings.0,
            position: plugin.position,
            installed_by: plugin.installed_by,
            uploaded_at: plugin.uploaded_at,
            activated_at: plugin.activated_at,
            updated_at: plugin.updated_at,
            loaded,
            hook_registrations,
        }
    }
}
