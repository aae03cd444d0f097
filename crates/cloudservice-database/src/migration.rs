//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use cloudservice_core::error::{AppError, ErrorKind};

/// Apply every pending migration under the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(
        available = migrator.iter().count(),
        "Applying plugin registry migrations"
    );

    migrator.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!("Plugin registry schema is up to date");
    Ok(())
}
