//! Plugin audit log queries.

use sqlx::{PgConnection, PgPool};

use cloudservice_core::error::{AppError, ErrorKind};
use cloudservice_core::result::AppResult;
use cloudservice_core::types::id::PluginLogId;
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_entity::plugin_log::{CreatePluginLog, PluginLog, PluginLogFilter};

/// Append an entry on an open connection or transaction.
pub(crate) async fn insert(conn: &mut PgConnection, data: &CreatePluginLog) -> AppResult<PluginLog> {
    sqlx::query_as::<_, PluginLog>(
        "INSERT INTO plugin_logs (id, plugin_id, action, user_id, message) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(PluginLogId::new())
    .bind(data.plugin_id)
    .bind(data.action)
    .bind(data.user_id)
    .bind(&data.message)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write plugin log", e))
}

/// List entries matching `filter`, newest first.
pub(crate) async fn search(
    pool: &PgPool,
    filter: &PluginLogFilter,
    page: PageRequest,
) -> AppResult<PageResponse<PluginLog>> {
    let mut conditions = Vec::new();
    let mut param_idx = 1u32;

    if filter.plugin_id.is_some() {
        conditions.push(format!("plugin_id = ${param_idx}"));
        param_idx += 1;
    }
    if filter.action.is_some() {
        conditions.push(format!("action = ${param_idx}"));
        param_idx += 1;
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM plugin_logs {where_clause}");
    let select_sql = format!(
        "SELECT * FROM plugin_logs {where_clause} \
         ORDER BY created_at DESC, id DESC LIMIT ${param_idx} OFFSET ${}",
        param_idx + 1
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut select_query = sqlx::query_as::<_, PluginLog>(&select_sql);

    if let Some(plugin_id) = filter.plugin_id {
        count_query = count_query.bind(plugin_id);
        select_query = select_query.bind(plugin_id);
    }
    if let Some(action) = filter.action {
        count_query = count_query.bind(action);
        select_query = select_query.bind(action);
    }

    let total = count_query.fetch_one(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, "Failed to count plugin logs", e)
    })?;

    let entries = select_query
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list plugin logs", e))?;

    Ok(PageResponse::new(entries, page, total as u64))
}
