//! Plugin system configuration.

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory plugins are extracted into, one sub-directory per module.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Directory uploaded archives are retained in.
    #[serde(default = "default_archive_directory")]
    pub archive_directory: String,
    /// Manifest file name looked up inside archives and plugin directories.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Whether to activate every enabled plugin on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Whether to scan the plugin directory for unregistered plugins on startup.
    #[serde(default = "default_true")]
    pub discover_on_startup: bool,
    /// Interval between registry reconciliation passes (0 disables).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
    /// Upper bound on a plugin's `ready` and `shutdown` calls.
    #[serde(default = "default_timeout")]
    pub ready_timeout_seconds: u64,
    /// Priority used for hook registrations that omit one.
    #[serde(default = "default_priority")]
    pub default_hook_priority: i32,
    /// Maximum accepted archive size in bytes.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    /// Maximum number of members in an archive.
    #[serde(default = "default_max_archive_entries")]
    pub max_archive_entries: usize,
    /// Maximum total uncompressed size of an archive in bytes.
    #[serde(default = "default_max_extracted_bytes")]
    pub max_extracted_bytes: u64,
    /// File extensions rejected inside archives (lowercase, without dot).
    #[serde(default = "default_blocked_extensions")]
    pub blocked_extensions: Vec<String>,
    /// Whether native shared objects shipped inside plugin directories may be loaded.
    #[serde(default)]
    pub allow_native_libraries: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            archive_directory: default_archive_directory(),
            manifest_file: default_manifest_file(),
            auto_load: true,
            discover_on_startup: true,
            reconcile_interval_seconds: default_reconcile_interval(),
            ready_timeout_seconds: default_timeout(),
            default_hook_priority: default_priority(),
            max_archive_bytes: default_max_archive_bytes(),
            max_archive_entries: default_max_archive_entries(),
            max_extracted_bytes: default_max_extracted_bytes(),
            blocked_extensions: default_blocked_extensions(),
            allow_native_libraries: false,
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_archive_directory() -> String {
    "./data/plugin_archives".to_string()
}

fn default_manifest_file() -> String {
    "plugin.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

fn default_priority() -> i32 {
    10
}

fn default_max_archive_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_archive_entries() -> usize {
    10_000
}

fn default_max_extracted_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_blocked_extensions() -> Vec<String> {
    ["exe", "dll", "so", "dylib", "bat", "cmd"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
