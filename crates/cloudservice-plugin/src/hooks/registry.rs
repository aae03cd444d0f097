//! Hook registry: handlers by hook point with priority ordering.
//!
//! Each hook point maps to an immutable, sorted slice. Writers build a new
//! slice and swap it in under the write lock; readers clone the `Arc` and
//! release the lock before touching any handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use cloudservice_core::types::id::PluginId;

use super::definitions::HookPoint;
use super::handler::HookHandler;
use crate::error::PluginError;

/// A registration waiting to be committed for an owner.
#[derive(Debug, Clone)]
pub struct HookRegistration {
    /// Hook point.
    pub hook: HookPoint,
    /// The handler.
    pub handler: HookHandler,
    /// Lower runs first.
    pub priority: i32,
    /// Optional filter key, a MIME type for preview providers.
    pub filter_key: Option<String>,
}

impl HookRegistration {
    /// Checks that the handler can serve the hook point.
    pub fn check(&self) -> Result<(), PluginError> {
        let expected = self.hook.capability();
        if self.handler.capability() == expected {
            Ok(())
        } else {
            Err(PluginError::HandlerMismatch {
                hook: self.hook.to_string(),
                expected: expected.as_str(),
            })
        }
    }
}

/// A committed registration.
#[derive(Debug, Clone)]
pub struct HookEntry {
    /// Hook point.
    pub hook: HookPoint,
    /// The handler.
    pub handler: HookHandler,
    /// Plugin that registered it.
    pub owner: PluginId,
    /// Lower runs first.
    pub priority: i32,
    /// Lowercased filter key. `None` matches every query.
    pub filter_key: Option<String>,
    /// Registration order, breaks priority ties.
    seq: u64,
}

impl HookEntry {
    fn matches(&self, filter: Option<&str>) -> bool {
        match (filter, &self.filter_key) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(key)) => key.eq_ignore_ascii_case(wanted),
        }
    }
}

/// Registry of hook handlers organized by hook point.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Hook point → sorted snapshot of entries.
    hooks: RwLock<HashMap<HookPoint, Arc<[HookEntry]>>>,
    /// Next registration sequence number.
    next_seq: AtomicU64,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one handler.
    pub fn register(
        &self,
        hook: HookPoint,
        handler: HookHandler,
        owner: PluginId,
        priority: i32,
        filter_key: Option<String>,
    ) -> Result<(), PluginError> {
        self.register_all(
            owner,
            vec![HookRegistration {
                hook,
                handler,
                priority,
                filter_key,
            }],
        )
    }

    /// Registers a batch for `owner`. Either every registration is
    /// committed or none is.
    pub fn register_all(
        &self,
        owner: PluginId,
        registrations: Vec<HookRegistration>,
    ) -> Result<(), PluginError> {
        for registration in &registrations {
            registration.check()?;
        }
        if registrations.is_empty() {
            return Ok(());
        }

        let count = registrations.len();
        let mut by_hook: HashMap<HookPoint, Vec<HookEntry>> = HashMap::new();
        for r in registrations {
            by_hook.entry(r.hook).or_default().push(HookEntry {
                hook: r.hook,
                handler: r.handler,
                owner,
                priority: r.priority,
                filter_key: r.filter_key.map(|k| k.trim().to_ascii_lowercase()),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            });
        }

        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        for (hook, added) in by_hook {
            let mut entries: Vec<HookEntry> = hooks
                .get(&hook)
                .map(|current| current.to_vec())
                .unwrap_or_default();
            entries.extend(added);
            entries.sort_by_key(|e| (e.priority, e.seq));

            debug!(hook = %hook, handlers = entries.len(), "Hook snapshot replaced");
            hooks.insert(hook, entries.into());
        }
        drop(hooks);

        info!(plugin_id = %owner, registrations = count, "Hook handlers registered");
        Ok(())
    }

    /// Handlers for `hook` in priority order, optionally narrowed by filter key.
    pub fn get_handlers(&self, hook: HookPoint, filter_key: Option<&str>) -> Vec<HookEntry> {
        let Some(snapshot) = self.snapshot(hook) else {
            return Vec::new();
        };
        let filter = filter_key.map(str::trim);
        snapshot
            .iter()
            .filter(|e| e.matches(filter))
            .cloned()
            .collect()
    }

    /// Removes every handler owned by `owner`. Returns how many were removed.
    pub fn clear_plugin_hooks(&self, owner: PluginId) -> usize {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;

        for entries in hooks.values_mut() {
            let before = entries.len();
            if entries.iter().any(|e| e.owner == owner) {
                let kept: Vec<HookEntry> =
                    entries.iter().filter(|e| e.owner != owner).cloned().collect();
                removed += before - kept.len();
                *entries = kept.into();
            }
        }
        hooks.retain(|_, entries| !entries.is_empty());
        drop(hooks);

        if removed > 0 {
            info!(plugin_id = %owner, removed = removed, "Hook handlers cleared");
        }
        removed
    }

    /// Number of handlers registered for `hook`.
    pub fn handler_count(&self, hook: HookPoint) -> usize {
        self.snapshot(hook).map_or(0, |s| s.len())
    }

    /// Number of handlers owned by `owner` across all hook points.
    pub fn owned_count(&self, owner: PluginId) -> usize {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        hooks
            .values()
            .map(|entries| entries.iter().filter(|e| e.owner == owner).count())
            .sum()
    }

    /// Hook points with at least one handler, in declaration order.
    pub fn registered_hooks(&self) -> Vec<HookPoint> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        let mut points: Vec<HookPoint> = hooks.keys().copied().collect();
        points.sort();
        points
    }

    fn snapshot(&self, hook: HookPoint) -> Option<Arc<[HookEntry]>> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        hooks.get(&hook).cloned()
    }
}
