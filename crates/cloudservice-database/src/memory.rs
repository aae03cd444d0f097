//! In-memory plugin store.
//!
//! Holds records and log entries behind a single lock so that every
//! transition and its log entry become visible together, matching the
//! transactional behaviour of the PostgreSQL store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use cloudservice_core::error::AppError;
use cloudservice_core::result::AppResult;
use cloudservice_core::types::id::{PluginId, PluginLogId, UserId};
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_entity::plugin::{
    CreatePlugin, Plugin, PluginManifest, PluginPosition, PluginStatus, StatusChange,
};
use cloudservice_entity::plugin_log::{PluginAction, PluginLog, PluginLogFilter};

use crate::store::PluginStore;

#[derive(Debug, Default)]
struct State {
    plugins: HashMap<PluginId, Plugin>,
    logs: Vec<PluginLog>,
}

impl State {
    fn push_log(
        &mut self,
        plugin_id: PluginId,
        action: PluginAction,
        user_id: Option<UserId>,
        message: &str,
    ) {
        self.logs.push(PluginLog {
            id: PluginLogId::new(),
            plugin_id,
            action,
            user_id,
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// Process-local [`PluginStore`].
#[derive(Debug, Default)]
pub struct MemoryPluginStore {
    state: RwLock<State>,
}

impl MemoryPluginStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut plugins: Vec<Plugin>) -> Vec<Plugin> {
    plugins.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
    plugins
}

#[async_trait]
impl PluginStore for MemoryPluginStore {
    async fn create(&self, data: CreatePlugin, log_message: &str) -> AppResult<Plugin> {
        let mut state = self.state.write().await;

        if state.plugins.values().any(|p| p.slug == data.manifest.slug) {
            return Err(AppError::conflict(format!(
                "A plugin with slug '{}' is already installed",
                data.manifest.slug
            )));
        }
        if state.plugins.contains_key(&data.id) {
            return Err(AppError::conflict(format!("Plugin {} already exists", data.id)));
        }

        let plugin = data.into_plugin(Utc::now());
        state.push_log(plugin.id, PluginAction::Uploaded, plugin.installed_by, log_message);
        state.plugins.insert(plugin.id, plugin.clone());
        Ok(plugin)
    }

    async fn find_by_id(&self, id: PluginId) -> AppResult<Option<Plugin>> {
        Ok(self.state.read().await.plugins.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Plugin>> {
        let state = self.state.read().await;
        Ok(state.plugins.values().find(|p| p.slug == slug).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Plugin>> {
        let state = self.state.read().await;
        Ok(sorted(state.plugins.values().cloned().collect()))
    }

    async fn list_enabled(&self) -> AppResult<Vec<Plugin>> {
        let state = self.state.read().await;
        Ok(sorted(
            state.plugins.values().filter(|p| p.enabled).cloned().collect(),
        ))
    }

    async fn apply(&self, change: &StatusChange) -> AppResult<Plugin> {
        if !change.is_consistent() {
            return Err(AppError::validation(format!(
                "Illegal plugin transition {} -> {} (enabled = {})",
                change.expected, change.status, change.enabled
            )));
        }

        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(&change.plugin_id)
            .ok_or_else(|| AppError::not_found(format!("Plugin {} not found", change.plugin_id)))?;

        if plugin.status != change.expected {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is {} but {} was expected",
                plugin.slug, plugin.status, change.expected
            )));
        }

        let now = Utc::now();
        plugin.status = change.status;
        plugin.enabled = change.enabled;
        plugin.error_message = change.error_message.clone();
        if change.mark_activated {
            plugin.activated_at = Some(now);
        }
        plugin.updated_at = now;
        let updated = plugin.clone();

        state.push_log(change.plugin_id, change.action, change.actor, &change.message);
        Ok(updated)
    }

    async fn replace_manifest(
        &self,
        id: PluginId,
        manifest: &PluginManifest,
        log_message: &str,
    ) -> AppResult<Plugin> {
        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(&id)
            .filter(|p| p.status != PluginStatus::Active)
            .ok_or_else(|| {
                AppError::conflict(format!("Plugin {id} is missing or active; manifest not replaced"))
            })?;

        plugin.name = manifest.name.clone();
        plugin.version = manifest.version.clone();
        plugin.author = manifest.author.clone();
        plugin.description = manifest.description.clone();
        plugin.manifest = Json(manifest.clone());
        plugin.updated_at = Utc::now();
        let updated = plugin.clone();

        state.push_log(id, PluginAction::Uploaded, None, log_message);
        Ok(updated)
    }

    async fn update_settings(
        &self,
        id: PluginId,
        settings: serde_json::Value,
    ) -> AppResult<Plugin> {
        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))?;
        plugin.settings = Json(settings);
        plugin.updated_at = Utc::now();
        Ok(plugin.clone())
    }

    async fn update_position(&self, id: PluginId, position: PluginPosition) -> AppResult<Plugin> {
        let mut state = self.state.write().await;
        let plugin = state
            .plugins
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))?;
        plugin.position = position;
        plugin.updated_at = Utc::now();
        Ok(plugin.clone())
    }

    async fn delete(&self, id: PluginId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let existed = state.plugins.remove(&id).is_some();
        state.logs.retain(|l| l.plugin_id != id);
        Ok(existed)
    }

    async fn list_logs(
        &self,
        filter: &PluginLogFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<PluginLog>> {
        let state = self.state.read().await;
        let matching: Vec<&PluginLog> = state.logs.iter().rev().filter(|l| filter.matches(l)).collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(PageResponse::new(items, page, total))
    }
}
