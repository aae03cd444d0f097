//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use cloudservice_auth::jwt::JwtDecoder;
use cloudservice_core::config::AppConfig;
use cloudservice_plugin::PluginManager;
use cloudservice_service::{DashboardService, PluginAdminService, PreviewService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// When the server started
    pub started_at: Instant,

    // ── Auth ─────────────────────────────────────────────────
    /// JWT token decoder and validator
    pub jwt_decoder: Arc<JwtDecoder>,

    // ── Plugins ──────────────────────────────────────────────
    /// Plugin lifecycle manager
    pub plugin_manager: Arc<PluginManager>,

    // ── Services ─────────────────────────────────────────────
    /// Plugin administration
    pub plugin_admin: Arc<PluginAdminService>,
    /// File preview resolution
    pub preview_service: Arc<PreviewService>,
    /// Dashboard widget rendering
    pub dashboard_service: Arc<DashboardService>,
}

impl AppState {
    /// Wires services around an existing plugin manager.
    pub fn new(config: Arc<AppConfig>, plugin_manager: Arc<PluginManager>) -> Self {
        let jwt_decoder = Arc::new(JwtDecoder::new(&config.auth));
        let plugin_admin = Arc::new(PluginAdminService::new(Arc::clone(&plugin_manager)));
        let preview_service = Arc::new(PreviewService::new(
            Arc::clone(plugin_manager.registry()),
            &config.storage,
        ));
        let dashboard_service = Arc::new(DashboardService::new(Arc::clone(
            plugin_manager.registry(),
        )));

        Self {
            config,
            started_at: Instant::now(),
            jwt_decoder,
            plugin_manager,
            plugin_admin,
            preview_service,
            dashboard_service,
        }
    }
}
