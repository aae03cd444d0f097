//! File preview resolution.
//!
//! Preview providers are contributed by plugins through the
//! `file_preview_provider` hook point. The highest-priority provider
//! registered for the file's MIME type whose `can_preview` accepts the file
//! renders it. When no provider accepts the file, or the chosen provider
//! fails, the built-in preview for the MIME family is returned instead.

use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, warn};

use cloudservice_core::config::StorageConfig;
use cloudservice_core::error::AppError;
use cloudservice_core::types::id::PluginId;
use cloudservice_plugin::hooks::{HookPoint, HookRegistry};
use cloudservice_plugin::preview::{FileDescriptor, escape_html};

/// A rendered preview fragment.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPreview {
    /// HTML fragment.
    pub html: String,
    /// Plugin whose provider rendered the fragment; `None` for built-ins.
    pub provider: Option<PluginId>,
    /// Why the built-in preview was used despite an accepting provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Resolves and renders file previews.
#[derive(Clone)]
pub struct PreviewService {
    /// Shared hook registry.
    registry: Arc<HookRegistry>,
    /// Root directory files are served from.
    data_root: PathBuf,
    /// URL prefix for download links.
    download_url_prefix: String,
    /// Maximum bytes read for built-in text previews.
    text_limit: usize,
}

impl std::fmt::Debug for PreviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewService")
            .field("data_root", &self.data_root)
            .field("download_url_prefix", &self.download_url_prefix)
            .field("text_limit", &self.text_limit)
            .finish()
    }
}

impl PreviewService {
    /// Creates a new preview service.
    pub fn new(registry: Arc<HookRegistry>, config: &StorageConfig) -> Self {
        Self {
            registry,
            data_root: PathBuf::from(&config.data_root),
            download_url_prefix: config.download_url_prefix.trim_end_matches('/').to_string(),
            text_limit: config.text_preview_limit_bytes,
        }
    }

    /// Describes the file at `path`, relative to the data root.
    ///
    /// The MIME type is `mime_override` when given, otherwise guessed from
    /// the file name.
    pub async fn describe(
        &self,
        path: &str,
        mime_override: Option<&str>,
    ) -> Result<FileDescriptor, AppError> {
        let relative = normalize_relative(path)?;
        let full = self.data_root.join(&relative);

        let meta = tokio::fs::metadata(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File '{path}' not found"))
            } else {
                AppError::with_source(
                    cloudservice_core::error::ErrorKind::Storage,
                    format!("Failed to stat '{path}': {e}"),
                    e,
                )
            }
        })?;
        if !meta.is_file() {
            return Err(AppError::validation(format!("'{path}' is not a file")));
        }

        let mime_type = match mime_override.map(str::trim).filter(|m| !m.is_empty()) {
            Some(mime) => mime.to_ascii_lowercase(),
            None => mime_guess::from_path(&relative)
                .first_or_octet_stream()
                .essence_str()
                .to_ascii_lowercase(),
        };

        let id = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        let name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&id)
            .to_string();

        Ok(FileDescriptor {
            id,
            name,
            mime_type,
            size: meta.len(),
            path: full,
        })
    }

    /// Renders `file` with the first accepting provider, or the built-in
    /// preview.
    pub async fn render(&self, file: &FileDescriptor) -> RenderedPreview {
        let entries = self
            .registry
            .get_handlers(HookPoint::FilePreviewProvider, Some(file.mime_type.as_str()));

        for entry in &entries {
            let Some(provider) = entry.handler.as_preview_provider() else {
                continue;
            };

            let accepts = std::panic::catch_unwind(AssertUnwindSafe(|| provider.can_preview(file)))
                .unwrap_or_else(|_| {
                    error!(plugin_id = %entry.owner, file = %file.id, "can_preview panicked");
                    false
                });
            if !accepts {
                continue;
            }

            debug!(
                plugin_id = %entry.owner,
                file = %file.id,
                mime_type = %file.mime_type,
                "Rendering preview with plugin provider"
            );

            let reason = match AssertUnwindSafe(provider.render_preview(file))
                .catch_unwind()
                .await
            {
                Ok(Ok(html)) => {
                    return RenderedPreview {
                        html,
                        provider: Some(entry.owner),
                        fallback_reason: None,
                    };
                }
                Ok(Err(e)) => {
                    warn!(plugin_id = %entry.owner, file = %file.id, error = %e, "Preview provider failed");
                    e.to_string()
                }
                Err(_) => {
                    error!(plugin_id = %entry.owner, file = %file.id, "Preview provider panicked");
                    "provider panicked".to_string()
                }
            };

            return RenderedPreview {
                html: self.default_preview(file).await,
                provider: None,
                fallback_reason: Some(reason),
            };
        }

        RenderedPreview {
            html: self.default_preview(file).await,
            provider: None,
            fallback_reason: None,
        }
    }

    /// Download URL for `file`.
    pub fn download_url(&self, file: &FileDescriptor) -> String {
        let encoded = file
            .id
            .split('/')
            .map(|segment| utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{encoded}", self.download_url_prefix)
    }

    /// Built-in preview for the file's MIME family.
    pub async fn default_preview(&self, file: &FileDescriptor) -> String {
        if file.mime_type.starts_with("text/") {
            match self.read_text_head(&file.path).await {
                Ok(text) => {
                    let mut html = format!(
                        "<pre class=\"preview-text\">{}</pre>",
                        escape_html(&text)
                    );
                    if file.size > self.text_limit as u64 {
                        html.push_str(&format!(
                            "<p class=\"preview-truncated\">Showing the first {} bytes of {}.</p>",
                            self.text_limit, file.size
                        ));
                    }
                    return html;
                }
                Err(e) => {
                    warn!(file = %file.id, error = %e, "Failed to read file for text preview");
                }
            }
        } else if file.mime_type.starts_with("image/") {
            return format!(
                "<img class=\"preview-image\" src=\"{}\" alt=\"{}\">",
                escape_html(&self.download_url(file)),
                escape_html(&file.name)
            );
        }

        format!(
            "<div class=\"preview-download\"><p>No preview available for {}.</p>\
             <a href=\"{}\" download>Download</a></div>",
            escape_html(&file.name),
            escape_html(&self.download_url(file))
        )
    }

    async fn read_text_head(&self, path: &Path) -> std::io::Result<String> {
        let file = tokio::fs::File::open(path).await?;
        let mut buf = Vec::with_capacity(self.text_limit.min(8192));
        file.take(self.text_limit as u64).read_to_end(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Rejects absolute paths and parent references.
fn normalize_relative(path: &str) -> Result<PathBuf, AppError> {
    let mut out = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(AppError::validation(format!(
                    "Path '{path}' must stay inside the data root"
                )));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(AppError::validation("Path must not be empty"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloudservice_plugin::hooks::HookHandler;
    use cloudservice_plugin::preview::{FilePreviewProvider, PreviewError};

    struct Fixed {
        tag: &'static str,
        accept: bool,
    }

    #[async_trait]
    impl FilePreviewProvider for Fixed {
        fn supported_mime_types(&self) -> Vec<String> {
            vec!["text/plain".into()]
        }

        fn can_preview(&self, _file: &FileDescriptor) -> bool {
            self.accept
        }

        async fn render_preview(&self, _file: &FileDescriptor) -> Result<String, PreviewError> {
            Ok(format!("<p>{}</p>", self.tag))
        }
    }

    struct Broken;

    #[async_trait]
    impl FilePreviewProvider for Broken {
        fn supported_mime_types(&self) -> Vec<String> {
            vec!["text/plain".into()]
        }

        async fn render_preview(&self, _file: &FileDescriptor) -> Result<String, PreviewError> {
            Err(PreviewError::Render("boom".into()))
        }
    }

    struct Panicky;

    #[async_trait]
    impl FilePreviewProvider for Panicky {
        fn supported_mime_types(&self) -> Vec<String> {
            vec!["text/plain".into()]
        }

        async fn render_preview(&self, _file: &FileDescriptor) -> Result<String, PreviewError> {
            panic!("provider bug")
        }
    }

    fn service(root: &Path) -> (PreviewService, Arc<HookRegistry>) {
        let registry = Arc::new(HookRegistry::default());
        let config = StorageConfig {
            data_root: root.display().to_string(),
            download_url_prefix: "/files/download/".into(),
            text_preview_limit_bytes: 16,
        };
        (PreviewService::new(registry.clone(), &config), registry)
    }

    fn register(
        registry: &HookRegistry,
        provider: impl FilePreviewProvider + 'static,
        priority: i32,
    ) -> PluginId {
        let owner = PluginId::new();
        registry
            .register(
                HookPoint::FilePreviewProvider,
                HookHandler::preview(provider),
                owner,
                priority,
                Some("text/plain".to_string()),
            )
            .unwrap();
        owner
    }

    async fn notes(root: &Path, body: &str) -> std::path::PathBuf {
        let path = root.join("docs").join("notes.txt");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_describe_guesses_mime_and_rejects_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        notes(tmp.path(), "hello").await;
        let (svc, _) = service(tmp.path());

        let file = svc.describe("docs/notes.txt", None).await.unwrap();
        assert_eq!(file.id, "docs/notes.txt");
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 5);

        let file = svc.describe("/docs/notes.txt", Some("Application/Clock")).await.unwrap();
        assert_eq!(file.mime_type, "application/clock");

        assert!(svc.describe("../etc/passwd", None).await.is_err());
        assert!(svc.describe("", None).await.is_err());
        let missing = svc.describe("docs/none.txt", None).await.unwrap_err();
        assert_eq!(missing.kind, cloudservice_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_highest_priority_accepting_provider_wins() {
        let tmp = tempfile::tempdir().unwrap();
        notes(tmp.path(), "hello").await;
        let (svc, registry) = service(tmp.path());

        register(&registry, Fixed { tag: "declines", accept: false }, 1);
        let low = register(&registry, Fixed { tag: "low", accept: true }, 20);
        let high = register(&registry, Fixed { tag: "high", accept: true }, 5);

        let file = svc.describe("docs/notes.txt", None).await.unwrap();
        let preview = svc.render(&file).await;
        assert_eq!(preview.html, "<p>high</p>");
        assert_eq!(preview.provider, Some(high));

        registry.clear_plugin_hooks(high);
        let preview = svc.render(&file).await;
        assert_eq!(preview.provider, Some(low));
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back_to_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        notes(tmp.path(), "<b>hi</b>").await;
        let (svc, registry) = service(tmp.path());
        register(&registry, Broken, 1);
        register(&registry, Fixed { tag: "later", accept: true }, 2);

        let file = svc.describe("docs/notes.txt", None).await.unwrap();
        let preview = svc.render(&file).await;
        assert_eq!(preview.provider, None);
        assert!(preview.fallback_reason.unwrap().contains("boom"));
        assert_eq!(preview.html, "<pre class=\"preview-text\">&lt;b&gt;hi&lt;/b&gt;</pre>");
    }

    #[tokio::test]
    async fn test_panicking_provider_falls_back_to_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        notes(tmp.path(), "plain").await;
        let (svc, registry) = service(tmp.path());
        register(&registry, Panicky, 1);

        let file = svc.describe("docs/notes.txt", None).await.unwrap();
        let preview = svc.render(&file).await;
        assert_eq!(preview.fallback_reason.as_deref(), Some("provider panicked"));
        assert!(preview.html.contains("plain"));
    }

    #[tokio::test]
    async fn test_text_default_is_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        notes(tmp.path(), "0123456789abcdefXYZ").await;
        let (svc, _) = service(tmp.path());

        let file = svc.describe("docs/notes.txt", None).await.unwrap();
        let preview = svc.render(&file).await;
        assert!(preview.html.contains("0123456789abcdef<"));
        assert!(!preview.html.contains("XYZ"));
        assert!(preview.html.contains("first 16 bytes of 19"));
    }

    #[tokio::test]
    async fn test_image_and_download_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("my photo.png"), [0u8; 4]).await.unwrap();
        tokio::fs::write(tmp.path().join("data.bin"), [0u8; 4]).await.unwrap();
        let (svc, _) = service(tmp.path());

        let image = svc.describe("my photo.png", None).await.unwrap();
        let html = svc.render(&image).await.html;
        assert_eq!(
            html,
            "<img class=\"preview-image\" src=\"/files/download/my%20photo%2Epng\" alt=\"my photo.png\">"
        );

        let blob = svc.describe("data.bin", None).await.unwrap();
        assert_eq!(blob.mime_type, "application/octet-stream");
        let html = svc.render(&blob).await.html;
        assert!(html.starts_with("<div class=\"preview-download\">"));
        assert!(html.contains("href=\"/files/download/data%2Ebin\""));
    }
}
