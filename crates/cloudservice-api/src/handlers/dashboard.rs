//! Dashboard handler.

use axum::Json;
use axum::extract::State;

use cloudservice_service::RenderedWidget;

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/dashboard/widgets
pub async fn list_widgets(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<RenderedWidget>>>, ApiError> {
    let widgets = state.dashboard_service.widgets(&auth).await;
    tracing::debug!(user = %auth.username, count = widgets.len(), "Dashboard widgets rendered");
    Ok(Json(ApiResponse::ok(widgets)))
}
