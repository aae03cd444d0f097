//! The plugin registry persistence seam.

use async_trait::async_trait;

use cloudservice_core::result::AppResult;
use cloudservice_core::types::id::PluginId;
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_entity::plugin::{
    CreatePlugin, Plugin, PluginManifest, PluginPosition, StatusChange,
};
use cloudservice_entity::plugin_log::{PluginLog, PluginLogFilter};

/// Durable storage for plugin records and their audit log.
///
/// Every lifecycle change writes its log entry in the same transaction as
/// the record update, so a transition never lands without its entry.
#[async_trait]
pub trait PluginStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new record together with its `uploaded` log entry.
    ///
    /// Fails with `Conflict` when the slug is already taken.
    async fn create(&self, data: CreatePlugin, log_message: &str) -> AppResult<Plugin>;

    /// Find a plugin by ID.
    async fn find_by_id(&self, id: PluginId) -> AppResult<Option<Plugin>>;

    /// Find a plugin by slug.
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Plugin>>;

    /// All plugins ordered by name.
    async fn list(&self) -> AppResult<Vec<Plugin>>;

    /// Plugins with `enabled = true`, ordered by name.
    async fn list_enabled(&self) -> AppResult<Vec<Plugin>>;

    /// Apply a lifecycle transition and append its log entry.
    ///
    /// Fails with `Conflict` when the record no longer holds
    /// `change.expected`, and with `Validation` when the change itself
    /// breaks the status machine.
    async fn apply(&self, change: &StatusChange) -> AppResult<Plugin>;

    /// Replace the manifest-derived columns of an inactive plugin and
    /// append an `uploaded` log entry describing the update.
    async fn replace_manifest(
        &self,
        id: PluginId,
        manifest: &PluginManifest,
        log_message: &str,
    ) -> AppResult<Plugin>;

    /// Replace plugin settings.
    async fn update_settings(&self, id: PluginId, settings: serde_json::Value)
    -> AppResult<Plugin>;

    /// Move the plugin to another column of the preview page.
    async fn update_position(&self, id: PluginId, position: PluginPosition) -> AppResult<Plugin>;

    /// Delete a plugin and its log entries. Returns `true` if it existed.
    async fn delete(&self, id: PluginId) -> AppResult<bool>;

    /// List log entries, newest first.
    async fn list_logs(
        &self,
        filter: &PluginLogFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<PluginLog>>;
}
