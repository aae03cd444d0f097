//! Admin plugin management: upload, lifecycle, settings, placement, audit log.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use cloudservice_core::error::AppError;
use cloudservice_core::types::id::PluginId;
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_entity::plugin::{Plugin, PluginPosition};
use cloudservice_entity::plugin_log::{PluginLog, PluginLogFilter};
use cloudservice_plugin::PluginManager;
use cloudservice_plugin::hooks::HookPoint;
use cloudservice_plugin::manager::DiscoverySummary;

use super::view::PluginView;
use crate::context::RequestContext;

/// Number of handlers registered for one hook point.
#[derive(Debug, Clone, Serialize)]
pub struct HookSummary {
    pub hook: HookPoint,
    pub handlers: usize,
}

/// Handles administrative plugin operations.
///
/// Every method requires an admin [`RequestContext`].
#[derive(Debug, Clone)]
pub struct PluginAdminService {
    /// Plugin lifecycle manager.
    manager: Arc<PluginManager>,
}

impl PluginAdminService {
    /// Creates a new plugin admin service.
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self { manager }
    }

    /// The underlying manager.
    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Lists every installed plugin.
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<PluginView>, AppError> {
        ctx.require_admin()?;
        let plugins = self.manager.list().await?;
        Ok(plugins.into_iter().map(|p| self.view(p)).collect())
    }

    /// Gets one plugin.
    pub async fn get(&self, ctx: &RequestContext, id: PluginId) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.get(id).await?;
        Ok(self.view(plugin))
    }

    /// Installs an uploaded archive. The plugin starts `inactive`.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        archive: Vec<u8>,
    ) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.upload(archive, Some(ctx.user_id)).await?;
        info!(
            plugin_id = %plugin.id,
            slug = %plugin.slug,
            user = %ctx.username,
            "Plugin uploaded"
        );
        Ok(self.view(plugin))
    }

    /// Activates a plugin. Activation failures are reported on the
    /// returned record, not as an error.
    pub async fn activate(
        &self,
        ctx: &RequestContext,
        id: PluginId,
    ) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.activate(id, Some(ctx.user_id)).await?;
        Ok(self.view(plugin))
    }

    /// Deactivates a plugin.
    pub async fn deactivate(
        &self,
        ctx: &RequestContext,
        id: PluginId,
    ) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.deactivate(id, Some(ctx.user_id)).await?;
        Ok(self.view(plugin))
    }

    /// Removes a plugin and its files.
    pub async fn uninstall(&self, ctx: &RequestContext, id: PluginId) -> Result<(), AppError> {
        ctx.require_admin()?;
        self.manager.uninstall(id, Some(ctx.user_id)).await
    }

    /// Replaces a plugin's settings.
    pub async fn update_settings(
        &self,
        ctx: &RequestContext,
        id: PluginId,
        settings: serde_json::Value,
    ) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.update_settings(id, settings).await?;
        Ok(self.view(plugin))
    }

    /// Moves a plugin to another column of the preview page.
    pub async fn update_position(
        &self,
        ctx: &RequestContext,
        id: PluginId,
        position: PluginPosition,
    ) -> Result<PluginView, AppError> {
        ctx.require_admin()?;
        let plugin = self.manager.set_position(id, position).await?;
        info!(plugin_id = %id, position = %position, user_id = %ctx.user_id, "Plugin position updated");
        Ok(self.view(plugin))
    }

    /// Registers plugin directories found on disk.
    pub async fn discover(&self, ctx: &RequestContext) -> Result<DiscoverySummary, AppError> {
        ctx.require_admin()?;
        self.manager.discover().await
    }

    /// Lists audit log entries, newest first.
    pub async fn logs(
        &self,
        ctx: &RequestContext,
        filter: &PluginLogFilter,
        page: PageRequest,
    ) -> Result<PageResponse<PluginLog>, AppError> {
        ctx.require_admin()?;
        self.manager.logs(filter, page).await
    }

    /// Hook points with registered handlers in this process.
    pub fn hooks(&self, ctx: &RequestContext) -> Result<Vec<HookSummary>, AppError> {
        ctx.require_admin()?;
        let registry = self.manager.registry();
        Ok(registry
            .registered_hooks()
            .into_iter()
            .map(|hook| HookSummary {
                hook,
                handlers: registry.handler_count(hook),
            })
            .collect())
    }

    fn view(&self, plugin: Plugin) -> PluginView {
        let loaded = self.manager.is_loaded(&plugin);
        let registrations = self.manager.registry().owned_count(plugin.id);
        PluginView::new(plugin, loaded, registrations)
    }
}
