//! Module runtime: search path, loaded-module cache and entry resolution.
//!
//! Activation pushes a plugin's directory onto the search path and imports
//! the module named after its slug. Importing resolves the manifest entry
//! point through the configured resolvers and caches the resulting entry
//! until the module is evicted.

pub mod catalog;
#[cfg(feature = "dynamic")]
pub mod native;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::{debug, info};

use cloudservice_core::types::id::PluginId;

use crate::entry::PluginEntry;
use crate::error::PluginError;

pub use catalog::StaticEntryResolver;
#[cfg(feature = "dynamic")]
pub use native::NativeEntryResolver;

/// A module found on the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Module name.
    pub name: String,
    /// Directory the module lives in.
    pub directory: PathBuf,
}

/// Turns a manifest entry point into a [`PluginEntry`].
pub trait EntryResolver: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Resolve `entry_point` for `module` to a fresh entry. `Ok(None)` means
    /// this resolver does not know the entry point.
    ///
    /// The entry, and every handler it registers, must keep alive whatever
    /// code it runs; dropping the entry does not end in-flight handler calls.
    fn resolve(
        &self,
        module: &ModuleSpec,
        entry_point: &str,
    ) -> Result<Option<Box<dyn PluginEntry>>, PluginError>;
}

/// A module imported into this process.
pub struct LoadedModule {
    /// Module name.
    pub name: String,
    /// Owning plugin.
    pub plugin_id: PluginId,
    /// Directory it was imported from.
    pub directory: PathBuf,
    /// Manifest entry point it was resolved from.
    pub entry_point: String,
    /// Resolver that produced the entry.
    pub resolver: &'static str,
    entry: Box<dyn PluginEntry>,
}

impl LoadedModule {
    /// The plugin entry instance.
    pub fn entry(&self) -> &dyn PluginEntry {
        self.entry.as_ref()
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("plugin_id", &self.plugin_id)
            .field("directory", &self.directory)
            .field("entry_point", &self.entry_point)
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Process-local module state.
#[derive(Debug)]
pub struct ModuleRuntime {
    manifest_file: String,
    search_path: RwLock<Vec<PathBuf>>,
    modules: DashMap<String, Arc<LoadedModule>>,
    resolvers: Vec<Arc<dyn EntryResolver>>,
}

impl ModuleRuntime {
    /// Creates a runtime that recognizes module directories by `manifest_file`.
    pub fn new(manifest_file: impl Into<String>, resolvers: Vec<Arc<dyn EntryResolver>>) -> Self {
        Self {
            manifest_file: manifest_file.into(),
            search_path: RwLock::new(Vec::new()),
            modules: DashMap::new(),
            resolvers,
        }
    }

    /// Adds `directory` to the search path if absent.
    pub fn push_search_path(&self, directory: &Path) {
        let mut path = self.search_path.write().unwrap_or_else(PoisonError::into_inner);
        if !path.iter().any(|p| p == directory) {
            path.push(directory.to_path_buf());
            debug!(directory = %directory.display(), "Search path entry added");
        }
    }

    /// Removes `directory` from the search path. Returns whether it was present.
    pub fn remove_search_path(&self, directory: &Path) -> bool {
        let mut path = self.search_path.write().unwrap_or_else(PoisonError::into_inner);
        let before = path.len();
        path.retain(|p| p != directory);
        before != path.len()
    }

    /// Current search path.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.search_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Locates `module_name` on the search path.
    pub fn find_module(&self, module_name: &str) -> Result<ModuleSpec, PluginError> {
        let path = self.search_path.read().unwrap_or_else(PoisonError::into_inner);
        path.iter()
            .find(|dir| {
                dir.file_name().and_then(|n| n.to_str()) == Some(module_name)
                    && dir.join(&self.manifest_file).is_file()
            })
            .map(|dir| ModuleSpec {
                name: module_name.to_string(),
                directory: dir.clone(),
            })
            .ok_or_else(|| PluginError::ImportFailure {
                module: module_name.to_string(),
                reason: format!(
                    "no search path entry named '{module_name}' contains {}",
                    self.manifest_file
                ),
            })
    }

    /// Imports `module_name` and resolves `entry_point` to a fresh entry,
    /// replacing any cached module of the same name.
    pub fn import(
        &self,
        plugin_id: PluginId,
        module_name: &str,
        entry_point: &str,
    ) -> Result<Arc<LoadedModule>, PluginError> {
        let spec = self.find_module(module_name)?;

        for resolver in &self.resolvers {
            if let Some(entry) = resolver.resolve(&spec, entry_point)? {
                let module = Arc::new(LoadedModule {
                    name: spec.name.clone(),
                    plugin_id,
                    directory: spec.directory.clone(),
                    entry_point: entry_point.to_string(),
                    resolver: resolver.name(),
                    entry,
                });
                self.modules.insert(spec.name.clone(), module.clone());

                info!(
                    plugin_id = %plugin_id,
                    module = %spec.name,
                    entry_point = %entry_point,
                    resolver = resolver.name(),
                    "Plugin module imported"
                );
                return Ok(module);
            }
        }

        Err(PluginError::UnknownEntryPoint {
            entry_point: entry_point.to_string(),
        })
    }

    /// Removes `module_name` from the cache.
    pub fn evict(&self, module_name: &str) -> Option<Arc<LoadedModule>> {
        let evicted = self.modules.remove(module_name).map(|(_, m)| m);
        if evicted.is_some() {
            debug!(module = %module_name, "Plugin module evicted");
        }
        evicted
    }

    /// The cached module, if loaded.
    pub fn get(&self, module_name: &str) -> Option<Arc<LoadedModule>> {
        self.modules.get(module_name).map(|m| m.value().clone())
    }

    /// Whether `module_name` is loaded.
    pub fn is_loaded(&self, module_name: &str) -> bool {
        self.modules.contains_key(module_name)
    }

    /// Every loaded module.
    pub fn loaded_modules(&self) -> Vec<Arc<LoadedModule>> {
        self.modules.iter().map(|m| m.value().clone()).collect()
    }
}
