//! Storage and preview configuration.

use serde::{Deserialize, Serialize};

/// File storage configuration used by the preview endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory user files are served from.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// URL prefix the built-in image and download fallbacks link to.
    #[serde(default = "default_download_url")]
    pub download_url_prefix: String,
    /// Maximum number of bytes the built-in text preview reads.
    #[serde(default = "default_text_preview_limit")]
    pub text_preview_limit_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            download_url_prefix: default_download_url(),
            text_preview_limit_bytes: default_text_preview_limit(),
        }
    }
}

fn default_data_root() -> String {
    "./data/files".to_string()
}

fn default_download_url() -> String {
    "/files/download".to_string()
}

fn default_text_preview_limit() -> usize {
    64 * 1024
}
