//! Native entry resolution using `libloading` (feature-gated).
//!
//! A plugin directory may ship a shared library named after its module
//! (`libclock_preview.so`, `clock_preview.dll`, ...) exporting
//! `cloudservice_plugin_entry`, normally generated with
//! [`export_plugin_entry!`](crate::export_plugin_entry).
//!
//! The library is unloaded once nothing references code inside it. The
//! entry and every handler it registers hold the library, so a handler
//! still running after deactivation keeps it mapped until it returns.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{EntryResolver, ModuleSpec};
use crate::entry::{EntryContext, HookRegistrar, PluginEntry};
use crate::error::PluginError;
use crate::hooks::HookHandler;
use crate::preview::{FileDescriptor, FilePreviewProvider, PreviewError};
use crate::widget::{DashboardWidgetProvider, WidgetDescriptor, WidgetViewer};

/// Symbol every native plugin exports.
pub const ENTRY_SYMBOL: &[u8] = b"cloudservice_plugin_entry";

/// Type of the exported constructor.
pub type CreateEntryFn = unsafe extern "C" fn() -> *mut Box<dyn PluginEntry>;

type LibraryHandle = Arc<dyn Any + Send + Sync>;

/// Resolves entries from shared libraries inside plugin directories.
#[derive(Debug, Default)]
pub struct NativeEntryResolver;

impl NativeEntryResolver {
    /// Creates the resolver.
    pub fn new() -> Self {
        Self
    }
}

impl EntryResolver for NativeEntryResolver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn resolve(
        &self,
        module: &ModuleSpec,
        entry_point: &str,
    ) -> Result<Option<Box<dyn PluginEntry>>, PluginError> {
        let path = module
            .directory
            .join(libloading::library_filename(&module.name));
        if !path.is_file() {
            return Ok(None);
        }

        let import_err = |reason: String| PluginError::ImportFailure {
            module: module.name.clone(),
            reason,
        };

        // SAFETY: loading a plugin library runs its initializers. Native
        // libraries are only resolved when the operator enabled them.
        let library = unsafe { libloading::Library::new(&path) }
            .map_err(|e| import_err(format!("failed to load '{}': {e}", path.display())))?;

        // SAFETY: the symbol type matches `export_plugin_entry!`.
        let entry = unsafe {
            let create: libloading::Symbol<CreateEntryFn> = library
                .get(ENTRY_SYMBOL)
                .map_err(|e| import_err(format!("missing entry symbol: {e}")))?;
            let raw = create();
            if raw.is_null() {
                return Err(import_err("entry constructor returned null".to_string()));
            }
            *Box::from_raw(raw)
        };

        info!(
            module = %module.name,
            entry_point = %entry_point,
            path = %path.display(),
            "Native plugin library loaded"
        );

        Ok(Some(Box::new(NativeEntry {
            entry,
            library: Arc::new(library),
        })))
    }
}

/// An entry whose code lives in `library`.
struct NativeEntry {
    // Field order matters: the entry drops before the library.
    entry: Box<dyn PluginEntry>,
    library: LibraryHandle,
}

#[async_trait]
impl PluginEntry for NativeEntry {
    async fn ready(&self, ctx: &EntryContext, hooks: &mut HookRegistrar) -> anyhow::Result<()> {
        let mut staged = HookRegistrar::new(hooks.default_priority());
        self.entry.ready(ctx, &mut staged).await?;
        hooks.extend(staged.into_registrations().into_iter().map(|mut registration| {
            registration.handler = pin(registration.handler, &self.library);
            registration
        }));
        Ok(())
    }

    async fn shutdown(&self) {
        self.entry.shutdown().await;
    }
}

/// Wraps `handler` so that it holds `library` for as long as it lives.
fn pin(handler: HookHandler, library: &LibraryHandle) -> HookHandler {
    match handler {
        HookHandler::PreviewProvider(inner) => HookHandler::PreviewProvider(Arc::new(Pinned {
            inner,
            _library: Arc::clone(library),
        })),
        HookHandler::DashboardWidget(inner) => HookHandler::DashboardWidget(Arc::new(Pinned {
            inner,
            _library: Arc::clone(library),
        })),
    }
}

struct Pinned<T: ?Sized> {
    inner: Arc<T>,
    _library: LibraryHandle,
}

#[async_trait]
impl FilePreviewProvider for Pinned<dyn FilePreviewProvider> {
    fn supported_mime_types(&self) -> Vec<String> {
        self.inner.supported_mime_types()
    }

    fn can_preview(&self, file: &FileDescriptor) -> bool {
        self.inner.can_preview(file)
    }

    async fn render_preview(&self, file: &FileDescriptor) -> Result<String, PreviewError> {
        self.inner.render_preview(file).await
    }
}

#[async_trait]
impl DashboardWidgetProvider for Pinned<dyn DashboardWidgetProvider> {
    fn descriptor(&self) -> WidgetDescriptor {
        self.inner.descriptor()
    }

    fn is_visible(&self, viewer: &WidgetViewer) -> bool {
        self.inner.is_visible(viewer)
    }

    async fn render(&self, viewer: &WidgetViewer) -> anyhow::Result<String> {
        self.inner.render(viewer).await
    }
}
