//! Layered configuration.
//!
//! Sources, lowest precedence first: `default.toml`, `<env>.toml`, then
//! `CLOUDSERVICE__SECTION__KEY` environment variables. Every section and
//! field has a default, so an empty config directory still yields a
//! runnable (if insecure) server.

pub mod app;
pub mod auth;
pub mod database;
pub mod logging;
pub mod plugin;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::database::{DatabaseBackend, DatabaseConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::plugin::PluginConfig;
pub use self::storage::StorageConfig;

use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Plugin records and audit logs.
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// Files that previews are rendered for.
    pub storage: StorageConfig,
    pub plugins: PluginConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Merge the sources for environment `env` found under `dir`.
    /// Missing files are skipped.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CLOUDSERVICE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("plugins.blocked_extensions")
                    .with_list_parse_key("server.cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
