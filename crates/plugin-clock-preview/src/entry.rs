//! Plugin entry point.

use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{info, warn};

use cloudservice_plugin::{EntryContext, HookHandler, HookRegistrar, PluginEntry};

use crate::provider::{ClockPreviewProvider, ClockSettings};
use crate::widget::{ClockWidget, WIDGET_PRIORITY};

/// Priority of the preview registration.
pub const PRIORITY: i32 = 10;

/// Initializes the clock plugin.
#[derive(Debug, Default)]
pub struct ClockPreviewEntry {
    settings: OnceLock<ClockSettings>,
}

impl ClockPreviewEntry {
    /// Creates an uninitialized entry.
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> ClockSettings {
        self.settings.get().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PluginEntry for ClockPreviewEntry {
    /// Registers the preview provider for its supported MIME types and,
    /// when `dashboard_widget` is set, the dashboard clock.
    async fn ready(&self, ctx: &EntryContext, hooks: &mut HookRegistrar) -> anyhow::Result<()> {
        let settings = match serde_json::from_value::<ClockSettings>(ctx.settings.clone()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(plugin = %ctx.slug, error = %e, "Ignoring malformed clock settings");
                ClockSettings::default()
            }
        };
        let _ = self.settings.set(settings);
        let settings = self.settings();

        hooks.preview_provider(
            HookHandler::preview(ClockPreviewProvider::new(settings.clone())),
            Some(PRIORITY),
            &[],
        )?;
        if settings.dashboard_widget {
            hooks.dashboard_widget(
                HookHandler::widget(ClockWidget::new(settings.caption)),
                Some(WIDGET_PRIORITY),
            )?;
        }

        info!(
            plugin = %ctx.slug,
            version = %ctx.manifest.version,
            hooks = hooks.len(),
            "Clock preview plugin ready"
        );
        Ok(())
    }

    async fn shutdown(&self) {
        info!("Clock preview plugin unloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use cloudservice_core::types::id::PluginId;
    use cloudservice_entity::plugin::PluginManifest;
    use cloudservice_plugin::HookPoint;

    use crate::MANIFEST;

    fn context(settings: serde_json::Value) -> EntryContext {
        let manifest: PluginManifest = serde_json::from_str(MANIFEST).unwrap();
        EntryContext {
            plugin_id: PluginId::new(),
            slug: manifest.slug.clone(),
            module_name: "clock_preview".into(),
            directory: PathBuf::from("/tmp/clock-preview"),
            manifest,
            settings,
        }
    }

    #[tokio::test]
    async fn test_ready_registers_plugin_mime_type() {
        let entry = ClockPreviewEntry::new();
        let mut hooks = HookRegistrar::new(0);
        entry
            .ready(&context(serde_json::json!({})), &mut hooks)
            .await
            .unwrap();

        let staged = hooks.into_registrations();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].hook, HookPoint::FilePreviewProvider);
        assert_eq!(staged[0].priority, PRIORITY);
        assert_eq!(staged[0].filter_key.as_deref(), Some("application/plugin"));
    }

    #[tokio::test]
    async fn test_default_settings_add_dashboard_widget() {
        let ctx = context(serde_json::json!({}));
        let defaults = ctx.manifest.default_settings();
        let ctx = EntryContext {
            settings: defaults,
            ..ctx
        };
        let entry = ClockPreviewEntry::new();
        let mut hooks = HookRegistrar::new(0);
        entry.ready(&ctx, &mut hooks).await.unwrap();

        let staged = hooks.into_registrations();
        assert_eq!(staged.len(), 2);
        assert_eq!(staged[1].hook, HookPoint::DashboardWidget);
        assert_eq!(staged[1].priority, WIDGET_PRIORITY);
        assert!(staged[1].filter_key.is_none());
        let widget = staged[1].handler.as_widget_provider().unwrap();
        assert_eq!(widget.descriptor().id, crate::widget::WIDGET_ID);
    }

    #[tokio::test]
    async fn test_malformed_settings_fall_back_to_defaults() {
        let entry = ClockPreviewEntry::new();
        let mut hooks = HookRegistrar::new(0);
        entry
            .ready(&context(serde_json::json!({ "show_digital": "yes" })), &mut hooks)
            .await
            .unwrap();

        assert_eq!(hooks.len(), 1);
        assert!(entry.settings().show_digital);
    }

    #[test]
    fn test_manifest_is_valid() {
        let manifest = PluginManifest::from_slice(MANIFEST.as_bytes()).unwrap();
        manifest.check().unwrap();
        assert_eq!(manifest.slug, "clock-preview");
        assert_eq!(manifest.entry_point, crate::ENTRY_POINT);
        assert!(manifest.hooks.contains_key("file_preview_provider"));
        assert!(manifest.hooks.contains_key("ui_dashboard_widget"));
        assert!(manifest.settings_schema().is_some());
    }
}
