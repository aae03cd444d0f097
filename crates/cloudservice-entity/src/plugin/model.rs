//! Plugin entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

use cloudservice_core::types::id::{PluginId, UserId};

use super::manifest::PluginManifest;
use super::position::PluginPosition;
use super::status::PluginStatus;

/// An installed plugin. The durable source of truth for lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plugin {
    /// Unique plugin identifier.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Unique, immutable slug.
    pub slug: String,
    /// Semantic version string.
    pub version: String,
    /// Author or maintainer.
    pub author: String,
    /// Free-text description.
    pub description: String,
    /// Retained upload archive, if the plugin was uploaded.
    pub archive_path: Option<String>,
    /// Directory the plugin was extracted into.
    pub extracted_path: String,
    /// Importable module name, derived from the slug.
    pub module_name: String,
    /// Discovered in the plugin directory rather than uploaded.
    pub is_local: bool,
    /// Parsed manifest.
    pub manifest: Json<PluginManifest>,
    /// Plugin-specific settings.
    pub settings: Json<serde_json::Value>,
    /// Column of the file preview page the plugin renders into.
    pub position: PluginPosition,
    /// Whether the plugin should be loaded.
    pub enabled: bool,
    /// Current lifecycle status.
    pub status: PluginStatus,
    /// Failure message, present iff `status` is `error`.
    pub error_message: Option<String>,
    /// Admin who installed the plugin.
    pub installed_by: Option<UserId>,
    /// When the plugin was uploaded or discovered.
    pub uploaded_at: DateTime<Utc>,
    /// When the plugin was last activated.
    pub activated_at: Option<DateTime<Utc>>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Plugin {
    /// Check if the plugin is currently active.
    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Active
    }

    /// Check if the plugin should be loaded in every worker.
    pub fn should_be_loaded(&self) -> bool {
        self.enabled && self.is_active()
    }

    /// Return the parsed manifest.
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest.0
    }
}

/// Data required to create a new plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlugin {
    /// Pre-assigned identifier.
    pub id: PluginId,
    /// Retained upload archive.
    pub archive_path: Option<String>,
    /// Directory the plugin was extracted into.
    pub extracted_path: String,
    /// Whether the plugin was discovered locally.
    pub is_local: bool,
    /// Parsed and validated manifest.
    pub manifest: PluginManifest,
    /// Admin who installed the plugin.
    pub installed_by: Option<UserId>,
}

impl CreatePlugin {
    /// Build the initial `inactive`, disabled record for a manifest.
    pub fn into_plugin(self, now: DateTime<Utc>) -> Plugin {
        let manifest = self.manifest;
        Plugin {
            id: self.id,
            name: manifest.name.clone(),
            slug: manifest.slug.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            description: manifest.description.clone(),
            archive_path: self.archive_path,
            extracted_path: self.extracted_path,
            module_name: manifest.module_name(),
            is_local: self.is_local,
            settings: Json(manifest.default_settings()),
            manifest: Json(manifest),
            position: PluginPosition::default(),
            enabled: false,
            status: PluginStatus::Inactive,
            error_message: None,
            installed_by: self.installed_by,
            uploaded_at: now,
            activated_at: None,
            updated_at: now,
        }
    }
}
