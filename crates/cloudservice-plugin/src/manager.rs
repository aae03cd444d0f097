//! Plugin manager: the hot-load lifecycle.
//!
//! Durable state lives in the [`PluginStore`]; process-local state is the
//! [`ModuleRuntime`] and the shared [`HookRegistry`]. Every operation on a
//! plugin holds that plugin's mutex, and every durable status change is
//! guarded by the status the operation observed.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use cloudservice_core::config::PluginConfig;
use cloudservice_core::error::{AppError, ErrorKind};
use cloudservice_core::result::AppResult;
use cloudservice_core::types::id::{PluginId, UserId};
use cloudservice_core::types::pagination::{PageRequest, PageResponse};
use cloudservice_database::PluginStore;
use cloudservice_entity::plugin::{
    CreatePlugin, Plugin, PluginManifest, PluginPosition, PluginStatus, StatusChange,
};
use cloudservice_entity::plugin_log::{PluginLog, PluginLogFilter};

use crate::archive::{self, ArchiveLimits, ValidatedArchive};
use crate::entry::{EntryContext, HookRegistrar};
use crate::error::PluginError;
use crate::hooks::HookRegistry;
use crate::runtime::{EntryResolver, LoadedModule, ModuleRuntime};

/// Outcome of [`PluginManager::load_all_enabled`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    /// Plugins activated in this process.
    pub activated: usize,
    /// Plugins that failed and were moved to `error`.
    pub failed: usize,
}

/// Outcome of [`PluginManager::discover`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverySummary {
    /// New records created for unknown directories.
    pub created: Vec<String>,
    /// Known plugins whose manifest changed version or settings schema.
    pub updated: Vec<String>,
    /// Directories skipped because their manifest is invalid.
    pub invalid: Vec<String>,
}

/// Outcome of [`PluginManager::reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileSummary {
    /// Modules loaded because the store says they are active.
    pub loaded: usize,
    /// Modules unloaded because the store no longer says they are active.
    pub unloaded: usize,
    /// Loads that failed.
    pub failed: usize,
}

/// Owns the plugin lifecycle for this process.
#[derive(Debug)]
pub struct PluginManager {
    store: Arc<dyn PluginStore>,
    registry: Arc<HookRegistry>,
    runtime: ModuleRuntime,
    config: PluginConfig,
    limits: ArchiveLimits,
    locks: DashMap<PluginId, Arc<Mutex<()>>>,
    /// Serializes installs so a slug is checked and claimed atomically.
    install_lock: Mutex<()>,
}

impl PluginManager {
    /// Creates a manager.
    pub fn new(
        store: Arc<dyn PluginStore>,
        registry: Arc<HookRegistry>,
        config: PluginConfig,
        resolvers: Vec<Arc<dyn EntryResolver>>,
    ) -> Self {
        Self {
            store,
            registry,
            runtime: ModuleRuntime::new(config.manifest_file.clone(), resolvers),
            limits: ArchiveLimits::from(&config),
            config,
            locks: DashMap::new(),
            install_lock: Mutex::new(()),
        }
    }

    /// The shared hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// The module runtime.
    pub fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    /// Plugin configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Archive limits derived from configuration.
    pub fn limits(&self) -> &ArchiveLimits {
        &self.limits
    }

    // ── Queries ──

    /// All plugins.
    pub async fn list(&self) -> AppResult<Vec<Plugin>> {
        self.store.list().await
    }

    /// One plugin.
    pub async fn get(&self, id: PluginId) -> AppResult<Plugin> {
        self.require(id).await
    }

    /// Audit log entries, newest first.
    pub async fn logs(
        &self,
        filter: &PluginLogFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<PluginLog>> {
        self.store.list_logs(filter, page).await
    }

    /// Whether the plugin's module is loaded in this process.
    pub fn is_loaded(&self, plugin: &Plugin) -> bool {
        self.runtime
            .get(&plugin.module_name)
            .is_some_and(|m| m.plugin_id == plugin.id)
    }

    // ── Upload ──

    /// Validates archive bytes without installing anything.
    pub async fn validate_archive(&self, bytes: Arc<[u8]>) -> AppResult<ValidatedArchive> {
        let limits = self.limits.clone();
        let validated = tokio::task::spawn_blocking(move || archive::validate(&bytes, &limits))
            .await
            .map_err(|e| AppError::internal(format!("Archive validation task failed: {e}")))??;
        Ok(validated)
    }

    /// Validates, stores and extracts an uploaded archive and records the
    /// plugin as `inactive`.
    pub async fn upload(&self, bytes: Vec<u8>, actor: Option<UserId>) -> AppResult<Plugin> {
        let bytes: Arc<[u8]> = bytes.into();
        let validated = self.validate_archive(bytes.clone()).await?;
        let manifest = validated.manifest.clone();

        let _install = self.install_lock.lock().await;

        if let Some(existing) = self.store.find_by_slug(&manifest.slug).await? {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is already installed (version {})",
                existing.slug, existing.version
            )));
        }

        let module_name = manifest.module_name();
        if let Some(other) = self
            .store
            .list()
            .await?
            .into_iter()
            .find(|p| p.module_name == module_name)
        {
            return Err(AppError::conflict(format!(
                "Plugin '{}' already uses module name '{module_name}'",
                other.slug
            )));
        }
        let destination = Path::new(&self.config.directory).join(&module_name);
        let archive_dir = PathBuf::from(&self.config.archive_directory);

        let archive_path = {
            let destination = destination.clone();
            tokio::task::spawn_blocking(move || -> Result<PathBuf, PluginError> {
                let archive_path = archive::retain(&bytes, &archive_dir, &validated.manifest)?;
                if let Err(e) = archive::extract(&bytes, &destination, &validated) {
                    if let Err(cleanup) = std::fs::remove_file(&archive_path) {
                        warn!(path = %archive_path.display(), error = %cleanup, "Failed to remove plugin archive");
                    }
                    return Err(e);
                }
                Ok(archive_path)
            })
            .await
            .map_err(|e| AppError::internal(format!("Archive extraction task failed: {e}")))??
        };

        let data = CreatePlugin {
            id: PluginId::new(),
            archive_path: Some(archive_path.to_string_lossy().into_owned()),
            extracted_path: destination.to_string_lossy().into_owned(),
            is_local: false,
            manifest: manifest.clone(),
            installed_by: actor,
        };
        let message = format!("Uploaded {} v{}", manifest.name, manifest.version);

        let plugin = match self.store.create(data, &message).await {
            Ok(plugin) => plugin,
            Err(e) => {
                remove_tree(&destination).await;
                remove_file(&archive_path).await;
                return Err(e);
            }
        };

        info!(
            plugin_id = %plugin.id,
            slug = %plugin.slug,
            version = %plugin.version,
            path = %plugin.extracted_path,
            "Plugin uploaded"
        );
        Ok(plugin)
    }

    // ── Lifecycle ──

    /// Activates a plugin.
    ///
    /// A failure during import or initialization is recorded on the plugin
    /// (status `error`) and the updated record is returned; it is not an
    /// `Err`. Activating an active plugin returns it unchanged.
    pub async fn activate(&self, id: PluginId, actor: Option<UserId>) -> AppResult<Plugin> {
        let _guard = self.lock(id).await;
        let plugin = self.require(id).await?;

        if plugin.status == PluginStatus::Active {
            debug!(plugin_id = %id, "Plugin already active");
            return Ok(plugin);
        }

        self.activate_locked(&plugin, actor, None).await
    }

    /// Deactivates a plugin. Plugins that are not active are returned unchanged.
    pub async fn deactivate(&self, id: PluginId, actor: Option<UserId>) -> AppResult<Plugin> {
        let _guard = self.lock(id).await;
        let plugin = self.require(id).await?;

        if plugin.status != PluginStatus::Active {
            debug!(plugin_id = %id, status = %plugin.status, "Plugin not active, nothing to do");
            return Ok(plugin);
        }

        let removed = self.unload_from_process(&plugin).await;
        let message = format!(
            "Deactivated {} v{} ({removed} hook registrations removed)",
            plugin.name, plugin.version
        );
        let updated = self
            .store
            .apply(&StatusChange::deactivated(id, actor, message))
            .await?;

        info!(plugin_id = %id, slug = %plugin.slug, hooks_removed = removed, "Plugin deactivated");
        Ok(updated)
    }

    /// Activates every enabled plugin in this process. Failures are
    /// recorded per plugin and do not stop the others.
    pub async fn load_all_enabled(&self) -> AppResult<LoadSummary> {
        let plugins = self.store.list_enabled().await?;
        let mut summary = LoadSummary::default();

        info!(count = plugins.len(), "Restoring enabled plugins");

        for plugin in plugins {
            let _guard = self.lock(plugin.id).await;
            let result = self
                .activate_locked(&plugin, None, Some("restored at startup"))
                .await;
            match result {
                Ok(p) if p.status == PluginStatus::Active => summary.activated += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    error!(plugin_id = %plugin.id, slug = %plugin.slug, error = %e, "Failed to restore plugin");
                    summary.failed += 1;
                }
            }
        }

        info!(
            activated = summary.activated,
            failed = summary.failed,
            "Enabled plugins restored"
        );
        Ok(summary)
    }

    /// Removes a plugin: unloads it, deletes its record and log, and
    /// removes its files.
    pub async fn uninstall(&self, id: PluginId, actor: Option<UserId>) -> AppResult<()> {
        let guard = self.lock(id).await;
        let plugin = self.require(id).await?;

        let removed = self.unload_from_process(&plugin).await;
        if !self.store.delete(id).await? {
            return Err(AppError::not_found(format!("Plugin {id} not found")));
        }

        remove_tree(Path::new(&plugin.extracted_path)).await;
        if let Some(archive_path) = &plugin.archive_path {
            remove_file(Path::new(archive_path)).await;
        }

        drop(guard);
        self.locks.remove(&id);

        info!(
            plugin_id = %id,
            slug = %plugin.slug,
            actor = ?actor,
            hooks_removed = removed,
            "Plugin uninstalled"
        );
        Ok(())
    }

    /// Replaces a plugin's settings. Takes effect on the next activation.
    pub async fn update_settings(
        &self,
        id: PluginId,
        settings: serde_json::Value,
    ) -> AppResult<Plugin> {
        if !settings.is_object() {
            return Err(AppError::validation("Plugin settings must be a JSON object"));
        }
        let _guard = self.lock(id).await;
        self.store.update_settings(id, settings).await
    }

    /// Moves a plugin to another column of the preview page.
    pub async fn set_position(&self, id: PluginId, position: PluginPosition) -> AppResult<Plugin> {
        let _guard = self.lock(id).await;
        let plugin = self.store.update_position(id, position).await?;
        debug!(plugin_id = %id, position = %position, "Plugin position changed");
        Ok(plugin)
    }

    // ── Discovery and reconciliation ──

    /// Registers plugin directories found under the plugins directory.
    pub async fn discover(&self) -> AppResult<DiscoverySummary> {
        let root = PathBuf::from(&self.config.directory);
        let mut summary = DiscoverySummary::default();

        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(directory = %root.display(), "Plugin directory does not exist");
                return Ok(summary);
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read plugin directory {}", root.display()),
                    e,
                ));
            }
        };

        let _install = self.install_lock.lock().await;

        while let Some(entry) = entries.next_entry().await? {
            let dir = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if dir_name.starts_with('.') {
                continue;
            }

            let manifest_path = dir.join(&self.config.manifest_file);
            let raw = match tokio::fs::read(&manifest_path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "Unreadable plugin manifest");
                    summary.invalid.push(dir_name);
                    continue;
                }
            };

            let manifest = match archive::parse_manifest(&raw) {
                Ok(m) if m.module_name() == dir_name => m,
                Ok(m) => {
                    warn!(
                        directory = %dir.display(),
                        expected = %m.module_name(),
                        "Plugin directory name does not match its slug"
                    );
                    summary.invalid.push(dir_name);
                    continue;
                }
                Err(e) => {
                    warn!(directory = %dir.display(), error = %e, "Invalid plugin manifest");
                    summary.invalid.push(dir_name);
                    continue;
                }
            };

            match self.store.find_by_slug(&manifest.slug).await? {
                None => {
                    let message = format!(
                        "Discovered {} v{} in plugin directory",
                        manifest.name, manifest.version
                    );
                    let plugin = self
                        .store
                        .create(
                            CreatePlugin {
                                id: PluginId::new(),
                                archive_path: None,
                                extracted_path: dir.to_string_lossy().into_owned(),
                                is_local: true,
                                manifest,
                                installed_by: None,
                            },
                            &message,
                        )
                        .await?;
                    info!(plugin_id = %plugin.id, slug = %plugin.slug, "Local plugin registered");
                    summary.created.push(plugin.slug);
                }
                Some(existing) if manifest_changed(existing.manifest(), &manifest) => {
                    if existing.status == PluginStatus::Active {
                        warn!(
                            slug = %existing.slug,
                            installed = %existing.version,
                            found = %manifest.version,
                            "Active plugin changed on disk; deactivate it to pick up the change"
                        );
                        continue;
                    }
                    let _guard = self.lock(existing.id).await;
                    let message = if existing.version == manifest.version {
                        format!(
                            "Updated settings schema of {} v{} from plugin directory",
                            manifest.name, manifest.version
                        )
                    } else {
                        format!(
                            "Updated {} from v{} to v{} from plugin directory",
                            manifest.name, existing.version, manifest.version
                        )
                    };
                    let plugin = self
                        .store
                        .replace_manifest(existing.id, &manifest, &message)
                        .await?;
                    summary.updated.push(plugin.slug);
                }
                Some(_) => {}
            }
        }

        if !summary.created.is_empty() || !summary.updated.is_empty() {
            info!(
                created = summary.created.len(),
                updated = summary.updated.len(),
                invalid = summary.invalid.len(),
                "Plugin discovery finished"
            );
        }
        Ok(summary)
    }

    /// Brings this process in line with the store: loads modules of active
    /// plugins that are missing here and unloads modules of plugins that
    /// are no longer active. Writes no log entries.
    pub async fn reconcile(&self) -> AppResult<ReconcileSummary> {
        let records = self.store.list().await?;
        let wanted: HashMap<PluginId, Plugin> = records
            .into_iter()
            .filter(|p| p.should_be_loaded())
            .map(|p| (p.id, p))
            .collect();
        let loaded: Vec<Arc<LoadedModule>> = self.runtime.loaded_modules();
        let loaded_ids: HashSet<PluginId> = loaded.iter().map(|m| m.plugin_id).collect();
        let mut summary = ReconcileSummary::default();

        for module in loaded.iter().filter(|m| !wanted.contains_key(&m.plugin_id)) {
            let _guard = self.lock(module.plugin_id).await;
            let still_wanted = self
                .store
                .find_by_id(module.plugin_id)
                .await?
                .is_some_and(|p| p.should_be_loaded());
            if still_wanted {
                continue;
            }
            self.unload_module(module.plugin_id, &module.name, &module.directory)
                .await;
            summary.unloaded += 1;
        }

        for plugin in wanted.values().filter(|p| !loaded_ids.contains(&p.id)) {
            let _guard = self.lock(plugin.id).await;
            let Some(current) = self.store.find_by_id(plugin.id).await? else {
                continue;
            };
            if !current.should_be_loaded() || self.is_loaded(&current) {
                continue;
            }
            match self.load_into_process(&current).await {
                Ok(_) => summary.loaded += 1,
                Err(e) => {
                    warn!(plugin_id = %current.id, slug = %current.slug, error = %e, "Failed to load active plugin");
                    summary.failed += 1;
                }
            }
        }

        if summary.loaded + summary.unloaded + summary.failed > 0 {
            info!(
                loaded = summary.loaded,
                unloaded = summary.unloaded,
                failed = summary.failed,
                "Plugin registry reconciled"
            );
        }
        Ok(summary)
    }

    /// Runs [`reconcile`](Self::reconcile) every `interval` until the
    /// returned handle is aborted.
    pub fn spawn_reconciler(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = manager.reconcile().await {
                    error!(error = %e, "Plugin reconciliation failed");
                }
            }
        })
    }

    /// Unloads every module from this process without touching the store.
    pub async fn shutdown(&self) {
        for module in self.runtime.loaded_modules() {
            let _guard = self.lock(module.plugin_id).await;
            self.unload_module(module.plugin_id, &module.name, &module.directory)
                .await;
        }
        info!("Plugin modules unloaded");
    }

    // ── Internals ──

    async fn require(&self, id: PluginId) -> AppResult<Plugin> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))
    }

    async fn lock(&self, id: PluginId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Loads `plugin` and records the outcome. Caller holds the plugin lock.
    async fn activate_locked(
        &self,
        plugin: &Plugin,
        actor: Option<UserId>,
        note: Option<&str>,
    ) -> AppResult<Plugin> {
        match self.load_into_process(plugin).await {
            Ok(registered) => {
                let message = match note {
                    Some(note) => format!(
                        "Activated {} v{} ({note}, {registered} hook registrations)",
                        plugin.name, plugin.version
                    ),
                    None => format!(
                        "Activated {} v{} ({registered} hook registrations)",
                        plugin.name, plugin.version
                    ),
                };
                let change = StatusChange::activated(plugin.id, plugin.status, actor, message);
                match self.store.apply(&change).await {
                    Ok(updated) => {
                        info!(
                            plugin_id = %plugin.id,
                            slug = %plugin.slug,
                            hooks = registered,
                            "Plugin activated"
                        );
                        Ok(updated)
                    }
                    Err(e) => {
                        self.unload_from_process(plugin).await;
                        Err(e)
                    }
                }
            }
            Err(e) => {
                error!(plugin_id = %plugin.id, slug = %plugin.slug, error = %e, "Plugin activation failed");
                let change = StatusChange::failed(plugin.id, plugin.status, actor, e.to_string());
                self.store.apply(&change).await
            }
        }
    }

    /// Imports the plugin and registers its hooks. On failure nothing of
    /// the plugin remains in this process.
    async fn load_into_process(&self, plugin: &Plugin) -> Result<usize, PluginError> {
        let directory = PathBuf::from(&plugin.extracted_path);
        self.unload_from_process(plugin).await;
        self.runtime.push_search_path(&directory);

        let result = self.import_and_register(plugin, &directory).await;
        if result.is_err() {
            self.unload_from_process(plugin).await;
        }
        result
    }

    async fn import_and_register(
        &self,
        plugin: &Plugin,
        directory: &Path,
    ) -> Result<usize, PluginError> {
        let manifest = plugin.manifest();
        let module = self
            .runtime
            .import(plugin.id, &plugin.module_name, &manifest.entry_point)?;

        let ctx = EntryContext {
            plugin_id: plugin.id,
            slug: plugin.slug.clone(),
            module_name: plugin.module_name.clone(),
            directory: directory.to_path_buf(),
            manifest: manifest.clone(),
            settings: plugin.settings.0.clone(),
        };
        let mut registrar = HookRegistrar::new(self.config.default_hook_priority);

        let timeout = Duration::from_secs(self.config.ready_timeout_seconds);
        let ready = AssertUnwindSafe(module.entry().ready(&ctx, &mut registrar)).catch_unwind();
        match tokio::time::timeout(timeout, ready).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(PluginError::init(format!("ready() failed: {e:#}"))),
            Ok(Err(panic)) => {
                return Err(PluginError::init(format!(
                    "ready() panicked: {}",
                    panic_message(panic.as_ref())
                )));
            }
            Err(_) => {
                return Err(PluginError::init(format!(
                    "ready() did not finish within {}s",
                    timeout.as_secs()
                )));
            }
        }

        let registrations = registrar.into_registrations();
        let count = registrations.len();
        self.registry.register_all(plugin.id, registrations)?;
        Ok(count)
    }

    async fn unload_from_process(&self, plugin: &Plugin) -> usize {
        self.unload_module(plugin.id, &plugin.module_name, Path::new(&plugin.extracted_path))
            .await
    }

    /// Clears hooks, evicts the module and removes the search path entry.
    /// Returns the number of hook registrations removed.
    async fn unload_module(&self, owner: PluginId, module_name: &str, directory: &Path) -> usize {
        let removed = self.registry.clear_plugin_hooks(owner);

        let evicted = self
            .runtime
            .get(module_name)
            .filter(|m| m.plugin_id == owner)
            .and_then(|_| self.runtime.evict(module_name));
        if let Some(module) = evicted {
            let timeout = Duration::from_secs(self.config.ready_timeout_seconds);
            let shutdown = AssertUnwindSafe(module.entry().shutdown()).catch_unwind();
            match tokio::time::timeout(timeout, shutdown).await {
                Ok(Ok(())) => {}
                Ok(Err(panic)) => warn!(
                    plugin_id = %owner,
                    panic = %panic_message(panic.as_ref()),
                    "Plugin shutdown panicked"
                ),
                Err(_) => warn!(plugin_id = %owner, "Plugin shutdown timed out"),
            }
        }

        self.runtime.remove_search_path(directory);
        removed
    }
}

/// Whether a manifest found on disk should replace the recorded one.
fn manifest_changed(recorded: &PluginManifest, found: &PluginManifest) -> bool {
    recorded.version != found.version || recorded.settings_schema() != found.settings_schema()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn remove_tree(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove plugin directory"),
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove plugin archive"),
    }
}
