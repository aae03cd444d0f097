//! The markdown preview provider.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use cloudservice_plugin::preview::{FileDescriptor, FilePreviewProvider, PreviewError};

use crate::render::{self, RenderOptions};

/// MIME types the provider understands.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["text/markdown", "text/x-markdown", "text/plain"];

/// File extensions treated as markdown when the MIME type is `text/plain`.
const MARKDOWN_EXTENSIONS: [&str; 3] = ["md", "markdown", "mdown"];

/// Plugin settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkdownSettings {
    /// Files larger than this are left to the built-in preview.
    pub max_bytes: u64,
    pub tables: bool,
    pub footnotes: bool,
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            tables: true,
            footnotes: true,
        }
    }
}

impl MarkdownSettings {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            tables: self.tables,
            footnotes: self.footnotes,
        }
    }
}

/// Renders markdown files to HTML.
#[derive(Debug, Clone, Default)]
pub struct MarkdownPreviewProvider {
    settings: MarkdownSettings,
}

impl MarkdownPreviewProvider {
    pub fn new(settings: MarkdownSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl FilePreviewProvider for MarkdownPreviewProvider {
    fn supported_mime_types(&self) -> Vec<String> {
        SUPPORTED_MIME_TYPES.iter().map(|m| m.to_string()).collect()
    }

    fn can_preview(&self, file: &FileDescriptor) -> bool {
        match file.mime_type.to_ascii_lowercase().as_str() {
            "text/markdown" | "text/x-markdown" => true,
            "text/plain" => file
                .extension()
                .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext.as_str())),
            _ => false,
        }
    }

    async fn render_preview(&self, file: &FileDescriptor) -> Result<String, PreviewError> {
        if file.size > self.settings.max_bytes {
            return Err(PreviewError::Unsupported(format!(
                "{} is {} bytes, above the {} byte markdown limit",
                file.name, file.size, self.settings.max_bytes
            )));
        }

        let bytes = tokio::fs::read(&file.path).await?;
        let source = String::from_utf8_lossy(&bytes);
        debug!(file = %file.id, bytes = bytes.len(), "Rendering markdown preview");

        let body = render::markdown_to_html(&source, self.settings.render_options());
        Ok(render::wrap(&body, &file.name))
    }
}
