//! Database migration commands.

use clap::{Args, Subcommand};

use cloudservice_core::config::AppConfig;
use cloudservice_core::error::AppError;

use crate::output;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Check that the database is reachable
    Ping,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let pool = super::connect(config).await?;
    let outcome = match &args.command {
        MigrateCommand::Run => pool
            .migrate()
            .await
            .map(|()| "Plugin registry schema is up to date"),
        MigrateCommand::Ping => pool.ping().await.map(|()| "Plugin store is reachable"),
    };
    pool.close().await;
    output::print_success(outcome?);
    Ok(())
}
