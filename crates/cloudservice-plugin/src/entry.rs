//! The plugin entry contract.
//!
//! A manifest's `entry_point` resolves to a [`PluginEntry`]. On activation
//! the runtime calls [`PluginEntry::ready`], during which the plugin
//! registers its hook handlers through a [`HookRegistrar`]. Registrations
//! are staged and only reach the shared registry once activation as a
//! whole has succeeded.

use std::path::PathBuf;

use async_trait::async_trait;

use cloudservice_core::types::id::PluginId;
use cloudservice_entity::plugin::PluginManifest;

use crate::error::PluginError;
use crate::hooks::{HookHandler, HookPoint, HookRegistration};

/// What a plugin sees of itself while initializing.
#[derive(Debug, Clone)]
pub struct EntryContext {
    /// Registry ID of the plugin.
    pub plugin_id: PluginId,
    /// Plugin slug.
    pub slug: String,
    /// Module name the plugin was imported under.
    pub module_name: String,
    /// Directory the plugin was extracted into.
    pub directory: PathBuf,
    /// Parsed manifest.
    pub manifest: PluginManifest,
    /// Current settings.
    pub settings: serde_json::Value,
}

/// Initialization contract every plugin implements.
#[async_trait]
pub trait PluginEntry: Send + Sync {
    /// Called once per activation. Every hook handler the plugin serves is
    /// registered here; manifest hook declarations are descriptive only.
    async fn ready(&self, ctx: &EntryContext, hooks: &mut HookRegistrar) -> anyhow::Result<()>;

    /// Called when the plugin's module is evicted.
    async fn shutdown(&self) {}
}

/// Collects a plugin's hook registrations during activation.
#[derive(Debug)]
pub struct HookRegistrar {
    default_priority: i32,
    staged: Vec<HookRegistration>,
}

impl HookRegistrar {
    /// Creates an empty registrar.
    pub fn new(default_priority: i32) -> Self {
        Self {
            default_priority,
            staged: Vec::new(),
        }
    }

    /// Stages `handler` for `hook`.
    ///
    /// One registration is staged per filter key. With no keys, a preview
    /// provider is keyed by its `supported_mime_types`; anything else is
    /// staged unfiltered.
    pub fn register<S: AsRef<str>>(
        &mut self,
        hook: HookPoint,
        handler: HookHandler,
        priority: Option<i32>,
        filter_keys: &[S],
    ) -> Result<(), PluginError> {
        let priority = priority.unwrap_or(self.default_priority);

        let mut keys: Vec<Option<String>> = filter_keys
            .iter()
            .map(|k| Some(k.as_ref().to_string()))
            .collect();
        if keys.is_empty() {
            if let Some(provider) = handler.as_preview_provider() {
                keys = provider.supported_mime_types().into_iter().map(Some).collect();
            }
        }
        if keys.is_empty() {
            keys.push(None);
        }

        let mut batch = Vec::with_capacity(keys.len());
        for filter_key in keys {
            let registration = HookRegistration {
                hook,
                handler: handler.clone(),
                priority,
                filter_key,
            };
            registration.check()?;
            batch.push(registration);
        }
        self.staged.extend(batch);
        Ok(())
    }

    /// Stages a preview provider for the given MIME types.
    pub fn preview_provider(
        &mut self,
        handler: HookHandler,
        priority: Option<i32>,
        mime_types: &[&str],
    ) -> Result<(), PluginError> {
        self.register(HookPoint::FilePreviewProvider, handler, priority, mime_types)
    }

    /// Stages a dashboard widget.
    pub fn dashboard_widget(
        &mut self,
        handler: HookHandler,
        priority: Option<i32>,
    ) -> Result<(), PluginError> {
        let none: [&str; 0] = [];
        self.register(HookPoint::DashboardWidget, handler, priority, &none)
    }

    /// Priority used when a registration does not name one.
    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    /// Stages registrations collected by another registrar.
    pub fn extend(&mut self, registrations: impl IntoIterator<Item = HookRegistration>) {
        self.staged.extend(registrations);
    }

    /// Number of staged registrations.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Takes the staged registrations.
    pub fn into_registrations(self) -> Vec<HookRegistration> {
        self.staged
    }
}

/// Exports a plugin entry from a native shared library.
///
/// The library must be built with the same toolchain as the server.
///
/// ```rust,ignore
/// cloudservice_plugin::export_plugin_entry!(MarkdownPreview::default());
/// ```
#[macro_export]
macro_rules! export_plugin_entry {
    ($ctor:expr) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn cloudservice_plugin_entry() -> *mut ::std::boxed::Box<dyn $crate::entry::PluginEntry> {
            let entry: ::std::boxed::Box<dyn $crate::entry::PluginEntry> = ::std::boxed::Box::new($ctor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(entry))
        }
    };
}
