//! File preview handler.

use axum::Json;
use axum::extract::{Query, State};
use validator::Validate;

use cloudservice_core::error::AppError;

use crate::dto::request::PreviewQuery;
use crate::dto::response::{ApiResponse, PreviewResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/preview?path=&mime_type=
pub async fn preview_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ApiResponse<PreviewResponse>>, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let file = state
        .preview_service
        .describe(&query.path, query.mime_type.as_deref())
        .await?;

    tracing::debug!(
        user = %auth.username,
        file = %file.id,
        mime_type = %file.mime_type,
        "Preview requested"
    );

    let preview = state.preview_service.render(&file).await;
    Ok(Json(ApiResponse::ok(PreviewResponse::new(file, preview))))
}
