//! Admin plugin management handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;

use cloudservice_core::error::AppError;
use cloudservice_core::types::id::PluginId;
use cloudservice_core::types::pagination::PageResponse;
use cloudservice_entity::plugin_log::{PluginLog, PluginLogFilter};
use cloudservice_plugin::manager::DiscoverySummary;
use cloudservice_service::PluginView;
use cloudservice_service::plugin::HookSummary;

use crate::dto::request::{LogQuery, UpdatePositionRequest};
use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::middleware::rbac::require_admin;
use crate::state::AppState;

/// Multipart field carrying the plugin archive.
const ARCHIVE_FIELD: &str = "archive";

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// GET /api/admin/plugins
pub async fn list_plugins(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<PluginView>> {
    require_admin(&auth)?;
    let plugins = state.plugin_admin.list(&auth).await?;
    Ok(Json(ApiResponse::ok(plugins)))
}

/// POST /api/admin/plugins (multipart, field `archive`)
pub async fn upload_plugin(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PluginView>>), ApiError> {
    require_admin(&auth)?;

    let mut archive: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(ARCHIVE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read archive: {e}")))?;
        archive = Some(bytes.to_vec());
    }

    let archive = archive
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::validation(format!("Missing multipart field '{ARCHIVE_FIELD}'")))?;

    let plugin = state.plugin_admin.upload(&auth, archive).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(plugin))))
}

/// POST /api/admin/plugins/discover
pub async fn discover_plugins(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<DiscoverySummary> {
    require_admin(&auth)?;
    let summary = state.plugin_admin.discover(&auth).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// GET /api/admin/plugins/{id}
pub async fn get_plugin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
) -> ApiResult<PluginView> {
    require_admin(&auth)?;
    let plugin = state.plugin_admin.get(&auth, id).await?;
    Ok(Json(ApiResponse::ok(plugin)))
}

/// DELETE /api/admin/plugins/{id}
pub async fn uninstall_plugin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
) -> ApiResult<MessageResponse> {
    require_admin(&auth)?;
    state.plugin_admin.uninstall(&auth, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: format!("Plugin {id} uninstalled"),
    })))
}

/// POST /api/admin/plugins/{id}/activate
///
/// Responds 200 even when activation fails; the returned record carries
/// `status = "error"` and the failure message.
pub async fn activate_plugin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
) -> ApiResult<PluginView> {
    require_admin(&auth)?;
    let plugin = state.plugin_admin.activate(&auth, id).await?;
    Ok(Json(ApiResponse::ok(plugin)))
}

/// POST /api/admin/plugins/{id}/deactivate
pub async fn deactivate_plugin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
) -> ApiResult<PluginView> {
    require_admin(&auth)?;
    let plugin = state.plugin_admin.deactivate(&auth, id).await?;
    Ok(Json(ApiResponse::ok(plugin)))
}

/// PUT /api/admin/plugins/{id}/settings
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
    Json(settings): Json<serde_json::Value>,
) -> ApiResult<PluginView> {
    require_admin(&auth)?;
    let plugin = state.plugin_admin.update_settings(&auth, id, settings).await?;
    Ok(Json(ApiResponse::ok(plugin)))
}

/// PUT /api/admin/plugins/{id}/position
pub async fn update_position(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
    Json(body): Json<UpdatePositionRequest>,
) -> ApiResult<PluginView> {
    require_admin(&auth)?;
    let plugin = state
        .plugin_admin
        .update_position(&auth, id, body.position)
        .await?;
    Ok(Json(ApiResponse::ok(plugin)))
}

/// GET /api/admin/plugins/logs?plugin_id=&action=&page=&per_page=
pub async fn list_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<LogQuery>,
) -> ApiResult<PageResponse<PluginLog>> {
    require_admin(&auth)?;
    let filter = PluginLogFilter {
        plugin_id: query.plugin_id,
        action: query.action,
    };
    let page = query.pagination().into_page_request();
    let logs = state.plugin_admin.logs(&auth, &filter, page).await?;
    Ok(Json(ApiResponse::ok(logs)))
}

/// GET /api/admin/plugins/{id}/logs
pub async fn plugin_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<PluginId>,
    Query(query): Query<LogQuery>,
) -> ApiResult<PageResponse<PluginLog>> {
    require_admin(&auth)?;
    // 404 for unknown plugins rather than an empty page
    state.plugin_admin.get(&auth, id).await?;

    let filter = PluginLogFilter {
        plugin_id: Some(id),
        action: query.action,
    };
    let page = query.pagination().into_page_request();
    let logs = state.plugin_admin.logs(&auth, &filter, page).await?;
    Ok(Json(ApiResponse::ok(logs)))
}

/// GET /api/admin/plugins/hooks
pub async fn list_hooks(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<HookSummary>> {
    require_admin(&auth)?;
    let hooks = state.plugin_admin.hooks(&auth)?;
    Ok(Json(ApiResponse::ok(hooks)))
}
