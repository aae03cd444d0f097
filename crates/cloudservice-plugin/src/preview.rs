//! File preview provider contract.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored file offered to preview providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Storage identifier of the file.
    pub id: String,
    /// Display name, including extension.
    pub name: String,
    /// Lowercase MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Location of the content on disk.
    pub path: PathBuf,
}

impl FileDescriptor {
    /// Lowercase extension of `name`, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Errors a provider may return from [`FilePreviewProvider::render_preview`].
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The provider cannot render this file after all.
    #[error("Unsupported file: {0}")]
    Unsupported(String),

    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering failed.
    #[error("Render failed: {0}")]
    Render(String),
}

/// A plugin component that renders an HTML fragment for a file.
///
/// Providers are registered under the `file_preview_provider` hook point,
/// filtered by MIME type. The first registered provider, in priority order,
/// whose [`can_preview`](Self::can_preview) accepts the file renders it.
#[async_trait]
pub trait FilePreviewProvider: Send + Sync {
    /// MIME types this provider understands.
    fn supported_mime_types(&self) -> Vec<String>;

    /// Whether this provider will render `file`.
    fn can_preview(&self, file: &FileDescriptor) -> bool {
        let mime = file.mime_type.to_ascii_lowercase();
        self.supported_mime_types()
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&mime))
    }

    /// Render `file` to an HTML fragment.
    async fn render_preview(&self, file: &FileDescriptor) -> Result<String, PreviewError>;
}

/// Escapes text for inclusion in HTML element content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    // Writing into a String cannot fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, input);
    out
}
