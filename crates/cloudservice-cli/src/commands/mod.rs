//! CLI command definitions and dispatch.

pub mod migrate;
pub mod plugin;
pub mod token;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use cloudservice_core::config::{AppConfig, DatabaseBackend};
use cloudservice_core::error::AppError;
use cloudservice_database::{DatabasePool, PgPluginStore, PluginStore};

use crate::output::OutputFormat;

/// CloudService plugin administration
#[derive(Debug, Parser)]
#[command(name = "cloudservice", version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Environment overlay loaded on top of `default.toml`
    #[arg(short, long, env = "CLOUDSERVICE_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Access token utilities
    Token(token::TokenArgs),
    /// Plugin registry inspection
    Plugin(plugin::PluginArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.config, &self.env)?;
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Token(args) => token::execute(args, &config),
            Commands::Plugin(args) => plugin::execute(args, &config, self.format).await,
        }
    }
}

/// Connect to the configured database without running migrations.
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    if config.database.backend != DatabaseBackend::Postgres {
        return Err(AppError::configuration(
            "This command needs database.backend = \"postgres\"",
        ));
    }
    let mut database = config.database.clone();
    database.run_migrations = false;
    DatabasePool::connect(&database).await
}

/// Open the plugin store backed by the configured database.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn PluginStore>, AppError> {
    let pool = connect(config).await?;
    Ok(Arc::new(PgPluginStore::new(pool.pool().clone())))
}
