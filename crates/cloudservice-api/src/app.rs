//! Router plus the middleware stack shared by every route.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let server = &state.config.server;
    // the body limit is what bounds plugin archive uploads
    let body_limit = DefaultBodyLimit::max(server.max_body_bytes);
    let cors = build_cors_layer(&server.cors);

    build_router()
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(from_fn(request_logging))
        .with_state(state)
}
