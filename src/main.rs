//! CloudService Server: plugin hot-load lifecycle and file preview.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use cloudservice_core::config::{AppConfig, DatabaseBackend, LogFormat};
use cloudservice_core::error::AppError;
use cloudservice_database::{DatabasePool, MemoryPluginStore, PgPluginStore, PluginStore};
use cloudservice_plugin::{EntryResolver, HookRegistry, PluginManager, StaticEntryResolver};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `CLOUDSERVICE_CONFIG_DIR` and the
/// `CLOUDSERVICE_ENV` overlay.
fn load_configuration() -> Result<AppConfig, AppError> {
    let dir = std::env::var("CLOUDSERVICE_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("CLOUDSERVICE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting CloudService v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Create data directories ──────────────────────────
    create_data_directories(&config).await?;

    // ── Step 2: Plugin store ─────────────────────────────────────
    let (store, db_pool) = open_store(&config).await?;

    // ── Step 3: Hook registry + plugin manager ───────────────────
    let registry = Arc::new(HookRegistry::new());
    let manager = Arc::new(PluginManager::new(
        store,
        Arc::clone(&registry),
        config.plugins.clone(),
        entry_resolvers(&config),
    ));

    // ── Step 4: Discover plugin directories ──────────────────────
    if config.plugins.discover_on_startup {
        match manager.discover().await {
            Ok(summary) => tracing::info!(
                created = summary.created.len(),
                updated = summary.updated.len(),
                invalid = summary.invalid.len(),
                "Plugin discovery complete"
            ),
            Err(e) => tracing::warn!("Plugin discovery failed: {}", e),
        }
    }

    // ── Step 5: Load enabled plugins ─────────────────────────────
    if config.plugins.auto_load {
        let summary = manager.load_all_enabled().await?;
        tracing::info!(
            activated = summary.activated,
            failed = summary.failed,
            "Enabled plugins loaded"
        );
    } else {
        tracing::info!("Plugin auto-load disabled");
    }

    // ── Step 6: Cross-process reconciliation ─────────────────────
    let reconciler = (config.plugins.reconcile_interval_seconds > 0).then(|| {
        manager.spawn_reconciler(Duration::from_secs(config.plugins.reconcile_interval_seconds))
    });

    // ── Step 7: Build and start HTTP server ──────────────────────
    let addr = config.server.bind_address();
    let grace = config.server.shutdown_grace();

    let state = cloudservice_api::AppState::new(Arc::new(config), Arc::clone(&manager));
    let app = cloudservice_api::build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("CloudService server listening on {}", addr);

    // ── Step 8: Graceful shutdown ────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if let Some(handle) = reconciler {
        handle.abort();
    }
    if tokio::time::timeout(grace, manager.shutdown()).await.is_err() {
        tracing::warn!("Plugin shutdown did not finish within {:?}", grace);
    }
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("CloudService server shut down gracefully");
    Ok(())
}

/// Open the configured plugin store. The pool is returned so it can be
/// closed on shutdown.
async fn open_store(
    config: &AppConfig,
) -> Result<(Arc<dyn PluginStore>, Option<DatabasePool>), AppError> {
    match config.database.backend {
        DatabaseBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = DatabasePool::connect(&config.database).await?;
            let store = Arc::new(PgPluginStore::new(pool.pool().clone()));
            Ok((store, Some(pool)))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using the in-memory plugin store; state is lost on restart");
            Ok((Arc::new(MemoryPluginStore::new()), None))
        }
    }
}

/// Entry resolvers in lookup order: plugins compiled into this binary
/// first, then native libraries when enabled.
fn entry_resolvers(config: &AppConfig) -> Vec<Arc<dyn EntryResolver>> {
    let mut catalog = StaticEntryResolver::new();
    plugin_clock_preview::register(&mut catalog);
    plugin_markdown_preview::register(&mut catalog);
    tracing::info!(entry_points = ?catalog.entry_points(), "Built-in plugin entries");

    let mut resolvers: Vec<Arc<dyn EntryResolver>> = vec![Arc::new(catalog)];

    if config.plugins.allow_native_libraries {
        #[cfg(feature = "dynamic")]
        resolvers.push(Arc::new(cloudservice_plugin::runtime::NativeEntryResolver::new()));

        #[cfg(not(feature = "dynamic"))]
        tracing::warn!(
            "plugins.allow_native_libraries is set but this build lacks the `dynamic` feature"
        );
    }

    resolvers
}

/// Create required data directories
async fn create_data_directories(config: &AppConfig) -> Result<(), AppError> {
    let dirs = [
        &config.storage.data_root,
        &config.plugins.directory,
        &config.plugins.archive_directory,
    ];

    for dir in dirs {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create dir '{dir}': {e}")))?;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
