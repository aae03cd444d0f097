//! Plugin registry commands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use cloudservice_core::config::AppConfig;
use cloudservice_core::error::AppError;
use cloudservice_core::types::pagination::PageRequest;
use cloudservice_entity::plugin::Plugin;
use cloudservice_entity::plugin_log::{PluginLog, PluginLogFilter};
use cloudservice_plugin::archive::{self, ArchiveLimits};

use crate::output::{self, OutputFormat};

/// Arguments for plugin commands
#[derive(Debug, Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommand,
}

/// Plugin subcommands
#[derive(Debug, Subcommand)]
pub enum PluginCommand {
    /// Check an archive the way an upload would, without installing it
    Validate {
        /// Path to the zip archive
        archive: PathBuf,
    },
    /// List installed plugins
    List,
    /// Show the lifecycle audit log
    Logs {
        /// Only entries for this plugin
        #[arg(short, long)]
        slug: Option<String>,
        /// Maximum number of entries
        #[arg(short, long, default_value_t = 50)]
        limit: u64,
    },
}

/// Plugin display row for table output
#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    slug: String,
    name: String,
    version: String,
    status: String,
    enabled: bool,
    local: bool,
    position: String,
    error: String,
}

impl From<Plugin> for PluginRow {
    fn from(p: Plugin) -> Self {
        Self {
            slug: p.slug,
            name: p.name,
            version: p.version,
            status: p.status.to_string(),
            enabled: p.enabled,
            local: p.is_local,
            position: p.position.to_string(),
            error: p.error_message.unwrap_or_default(),
        }
    }
}

/// Log display row for table output
#[derive(Debug, Serialize, Tabled)]
struct LogRow {
    time: String,
    plugin_id: String,
    action: String,
    user: String,
    message: String,
}

impl From<PluginLog> for LogRow {
    fn from(l: PluginLog) -> Self {
        Self {
            time: l.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            plugin_id: l.plugin_id.to_string(),
            action: l.action.to_string(),
            user: l.user_id.map(|u| u.to_string()).unwrap_or_else(|| "-".into()),
            message: l.message,
        }
    }
}

/// Execute plugin commands
pub async fn execute(
    args: &PluginArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        PluginCommand::Validate { archive: path } => validate(path, config, format).await,
        PluginCommand::List => {
            let store = super::open_store(config).await?;
            let rows: Vec<PluginRow> = store.list().await?.into_iter().map(Into::into).collect();
            output::print_list(&rows, format)
        }
        PluginCommand::Logs { slug, limit } => {
            let store = super::open_store(config).await?;
            let plugin_id = match slug {
                Some(slug) => Some(
                    store
                        .find_by_slug(slug)
                        .await?
                        .ok_or_else(|| AppError::not_found(format!("Plugin '{slug}' not found")))?
                        .id,
                ),
                None => None,
            };
            let filter = PluginLogFilter {
                plugin_id,
                action: None,
            };
            let page = store
                .list_logs(&filter, PageRequest::new(1, (*limit).max(1)))
                .await?;
            let rows: Vec<LogRow> = page.items.into_iter().map(Into::into).collect();
            output::print_list(&rows, format)
        }
    }
}

async fn validate(path: &Path, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::storage(format!("Cannot read {}: {e}", path.display())))?;
    let validated = archive::validate(&bytes, &ArchiveLimits::from(&config.plugins))?;
    let manifest = &validated.manifest;

    if format == OutputFormat::Json {
        return output::print_json(manifest);
    }

    output::print_success(&format!("{} is a valid plugin archive", path.display()));
    let mut fields = vec![
        ("Name", manifest.name.clone()),
        ("Slug", manifest.slug.clone()),
        ("Version", manifest.version.clone()),
        ("Entry point", manifest.entry_point.clone()),
        ("Module", manifest.module_name().to_string()),
        ("Members", validated.entries.to_string()),
        ("Settings", if manifest.has_settings() { "yes" } else { "no" }.to_string()),
    ];
    if let Some(prefix) = &validated.prefix {
        fields.push(("Wrapper dir", prefix.clone()));
    }
    for (hook, decl) in &manifest.hooks {
        fields.push((hook.as_str(), format!("{} {:?}", decl.handler, decl.mime_types)));
    }
    output::print_details(&fields);
    Ok(())
}
