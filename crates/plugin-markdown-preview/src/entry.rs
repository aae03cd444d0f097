//! Plugin entry point.

use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{info, warn};

use cloudservice_plugin::{EntryContext, HookHandler, HookRegistrar, PluginEntry};

use crate::provider::{MarkdownPreviewProvider, MarkdownSettings};

/// Priority of the `ready` registration.
pub const PRIORITY: i32 = 10;

/// Initializes the markdown plugin.
#[derive(Debug, Default)]
pub struct MarkdownPreviewEntry {
    settings: OnceLock<MarkdownSettings>,
}

impl MarkdownPreviewEntry {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self) -> MarkdownPreviewProvider {
        MarkdownPreviewProvider::new(self.settings.get().cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PluginEntry for MarkdownPreviewEntry {
    async fn ready(&self, ctx: &EntryContext, hooks: &mut HookRegistrar) -> anyhow::Result<()> {
        let settings = serde_json::from_value::<MarkdownSettings>(ctx.settings.clone())
            .unwrap_or_else(|e| {
                warn!(plugin = %ctx.slug, error = %e, "Ignoring malformed markdown settings");
                MarkdownSettings::default()
            });
        let _ = self.settings.set(settings);

        hooks.preview_provider(
            HookHandler::preview(self.provider()),
            Some(PRIORITY),
            &[],
        )?;

        info!(plugin = %ctx.slug, hooks = hooks.len(), "Markdown preview plugin ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use cloudservice_core::types::id::PluginId;
    use cloudservice_entity::plugin::PluginManifest;

    use crate::MANIFEST;

    #[test]
    fn test_manifest_is_valid() {
        let manifest = PluginManifest::from_slice(MANIFEST.as_bytes()).unwrap();
        manifest.check().unwrap();
        assert_eq!(manifest.module_name(), "markdown_preview");
        assert_eq!(manifest.default_settings()["max_bytes"], 1048576);
    }

    #[tokio::test]
    async fn test_ready_uses_settings() {
        let manifest = PluginManifest::from_slice(MANIFEST.as_bytes()).unwrap();
        let ctx = EntryContext {
            plugin_id: PluginId::new(),
            slug: manifest.slug.clone(),
            module_name: manifest.module_name(),
            directory: PathBuf::from("/tmp/markdown-preview"),
            settings: serde_json::json!({ "max_bytes": 10 }),
            manifest,
        };
        let entry = MarkdownPreviewEntry::new();
        let mut hooks = HookRegistrar::new(100);
        entry.ready(&ctx, &mut hooks).await.unwrap();

        let staged = hooks.into_registrations();
        let keys: Vec<_> = staged.iter().filter_map(|r| r.filter_key.as_deref()).collect();
        assert_eq!(keys, ["text/markdown", "text/x-markdown", "text/plain"]);
        assert!(staged.iter().all(|r| r.priority == PRIORITY));
        assert_eq!(entry.settings.get().map(|s| s.max_bytes), Some(10));
    }
}
