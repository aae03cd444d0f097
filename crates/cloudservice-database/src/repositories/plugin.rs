//! PostgreSQL plugin repository.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use cloudservice_core::error::{AppError, ErrorKind};
use cloudservice_core::result::AppResult;
use cloudservice_core::types::id::PluginId;
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_entity::plugin::{
    CreatePlugin, Plugin, PluginManifest, PluginPosition, StatusChange,
};
use cloudservice_entity::plugin_log::{CreatePluginLog, PluginAction, PluginLog, PluginLogFilter};

use super::plugin_log;
use crate::store::PluginStore;

/// [`PluginStore`] backed by the `plugins` and `plugin_logs` tables.
#[derive(Debug, Clone)]
pub struct PgPluginStore {
    pool: PgPool,
}

impl PgPluginStore {
    /// Create a new plugin store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))
    }
}

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(db_err("Failed to commit plugin transaction"))
}

#[async_trait]
impl PluginStore for PgPluginStore {
    async fn create(&self, data: CreatePlugin, log_message: &str) -> AppResult<Plugin> {
        let row = data.into_plugin(chrono::Utc::now());
        let mut tx = self.begin().await?;

        let plugin = sqlx::query_as::<_, Plugin>(
            "INSERT INTO plugins (id, name, slug, version, author, description, archive_path, \
             extracted_path, module_name, is_local, manifest, settings, enabled, status, installed_by, \
             position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING *",
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.slug)
        .bind(&row.version)
        .bind(&row.author)
        .bind(&row.description)
        .bind(&row.archive_path)
        .bind(&row.extracted_path)
        .bind(&row.module_name)
        .bind(row.is_local)
        .bind(&row.manifest)
        .bind(&row.settings)
        .bind(row.enabled)
        .bind(row.status)
        .bind(row.installed_by)
        .bind(row.position)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let unique = e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation());
            if unique {
                AppError::with_source(
                    ErrorKind::Conflict,
                    format!("A plugin with slug '{}' is already installed", row.slug),
                    e,
                )
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create plugin", e)
            }
        })?;

        plugin_log::insert(
            &mut tx,
            &CreatePluginLog {
                plugin_id: plugin.id,
                action: PluginAction::Uploaded,
                user_id: plugin.installed_by,
                message: log_message.to_string(),
            },
        )
        .await?;

        commit(tx).await?;
        Ok(plugin)
    }

    async fn find_by_id(&self, id: PluginId) -> AppResult<Option<Plugin>> {
        sqlx::query_as::<_, Plugin>("SELECT * FROM plugins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find plugin"))
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Plugin>> {
        sqlx::query_as::<_, Plugin>("SELECT * FROM plugins WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find plugin by slug"))
    }

    async fn list(&self) -> AppResult<Vec<Plugin>> {
        sqlx::query_as::<_, Plugin>("SELECT * FROM plugins ORDER BY name, slug")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list plugins"))
    }

    async fn list_enabled(&self) -> AppResult<Vec<Plugin>> {
        sqlx::query_as::<_, Plugin>(
            "SELECT * FROM plugins WHERE enabled = TRUE ORDER BY name, slug",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list enabled plugins"))
    }

    async fn apply(&self, change: &StatusChange) -> AppResult<Plugin> {
        if !change.is_consistent() {
            return Err(AppError::validation(format!(
                "Illegal plugin transition {} -> {} (enabled = {})",
                change.expected, change.status, change.enabled
            )));
        }

        let mut tx = self.begin().await?;

        let updated = sqlx::query_as::<_, Plugin>(
            "UPDATE plugins SET status = $2, enabled = $3, error_message = $4, \
             activated_at = CASE WHEN $5 THEN NOW() ELSE activated_at END, updated_at = NOW() \
             WHERE id = $1 AND status = $6 RETURNING *",
        )
        .bind(change.plugin_id)
        .bind(change.status)
        .bind(change.enabled)
        .bind(&change.error_message)
        .bind(change.mark_activated)
        .bind(change.expected)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to update plugin status"))?;

        let Some(plugin) = updated else {
            let current: Option<Plugin> =
                sqlx::query_as::<_, Plugin>("SELECT * FROM plugins WHERE id = $1")
                    .bind(change.plugin_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err("Failed to find plugin"))?;
            return Err(match current {
                None => AppError::not_found(format!("Plugin {} not found", change.plugin_id)),
                Some(p) => AppError::conflict(format!(
                    "Plugin '{}' is {} but {} was expected",
                    p.slug, p.status, change.expected
                )),
            });
        };

        plugin_log::insert(
            &mut tx,
            &CreatePluginLog {
                plugin_id: plugin.id,
                action: change.action,
                user_id: change.actor,
                message: change.message.clone(),
            },
        )
        .await?;

        commit(tx).await?;

        debug!(
            plugin_id = %plugin.id,
            status = %plugin.status,
            action = %change.action,
            "Plugin transition committed"
        );
        Ok(plugin)
    }

    async fn replace_manifest(
        &self,
        id: PluginId,
        manifest: &PluginManifest,
        log_message: &str,
    ) -> AppResult<Plugin> {
        let mut tx = self.begin().await?;

        let plugin = sqlx::query_as::<_, Plugin>(
            "UPDATE plugins SET name = $2, version = $3, author = $4, description = $5, \
             manifest = $6, updated_at = NOW() \
             WHERE id = $1 AND status <> 'active' RETURNING *",
        )
        .bind(id)
        .bind(&manifest.name)
        .bind(&manifest.version)
        .bind(&manifest.author)
        .bind(&manifest.description)
        .bind(Json(manifest))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to update plugin manifest"))?
        .ok_or_else(|| {
            AppError::conflict(format!("Plugin {id} is missing or active; manifest not replaced"))
        })?;

        plugin_log::insert(
            &mut tx,
            &CreatePluginLog {
                plugin_id: id,
                action: PluginAction::Uploaded,
                user_id: None,
                message: log_message.to_string(),
            },
        )
        .await?;

        commit(tx).await?;
        Ok(plugin)
    }

    async fn update_settings(
        &self,
        id: PluginId,
        settings: serde_json::Value,
    ) -> AppResult<Plugin> {
        sqlx::query_as::<_, Plugin>(
            "UPDATE plugins SET settings = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(settings))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to update plugin settings"))?
        .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))
    }

    async fn update_position(&self, id: PluginId, position: PluginPosition) -> AppResult<Plugin> {
        sqlx::query_as::<_, Plugin>(
            "UPDATE plugins SET position = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(position)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to update plugin position"))?
        .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))
    }

    async fn delete(&self, id: PluginId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM plugins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete plugin"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_logs(
        &self,
        filter: &PluginLogFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<PluginLog>> {
        plugin_log::search(&self.pool, filter, page).await
    }
}
