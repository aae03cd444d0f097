//! Route definitions for the CloudService HTTP API.
//!
//! All routes are mounted under `/api`. State is attached by
//! [`build_app`](crate::app::build_app).

use axum::Router;
use axum::routing::{get, post};

use crate::handlers;
use crate::state::AppState;

/// Builds the route tree.
pub fn build_router() -> Router<AppState> {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(preview_routes())
        .merge(dashboard_routes())
        .merge(admin_plugin_routes());

    Router::new().nest("/api", api_routes)
}

/// Liveness
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// File preview for any authenticated user
fn preview_routes() -> Router<AppState> {
    Router::new().route("/preview", get(handlers::preview::preview_file))
}

/// Dashboard widgets for any authenticated user
fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard/widgets", get(handlers::dashboard::list_widgets))
}

/// Plugin administration (admin only)
fn admin_plugin_routes() -> Router<AppState> {
    use handlers::admin::plugins;

    Router::new()
        .route(
            "/admin/plugins",
            get(plugins::list_plugins).post(plugins::upload_plugin),
        )
        .route("/admin/plugins/discover", post(plugins::discover_plugins))
        .route("/admin/plugins/logs", get(plugins::list_logs))
        .route("/admin/plugins/hooks", get(plugins::list_hooks))
        .route(
            "/admin/plugins/{id}",
            get(plugins::get_plugin).delete(plugins::uninstall_plugin),
        )
        .route("/admin/plugins/{id}/activate", post(plugins::activate_plugin))
        .route("/admin/plugins/{id}/deactivate", post(plugins::deactivate_plugin))
        .route(
            "/admin/plugins/{id}/settings",
            axum::routing::put(plugins::update_settings),
        )
        .route(
            "/admin/plugins/{id}/position",
            axum::routing::put(plugins::update_position),
        )
        .route("/admin/plugins/{id}/logs", get(plugins::plugin_logs))
}
