//! In-process entry catalog.

use std::collections::HashMap;
use std::sync::Arc;

use super::{EntryResolver, ModuleSpec};
use crate::entry::PluginEntry;
use crate::error::PluginError;

type EntryFactory = Arc<dyn Fn() -> Box<dyn PluginEntry> + Send + Sync>;

/// Resolves entry points compiled into the server binary.
///
/// Each resolve builds a fresh instance, so state held by an entry does not
/// survive a deactivate/activate cycle.
#[derive(Clone, Default)]
pub struct StaticEntryResolver {
    factories: HashMap<String, EntryFactory>,
}

impl StaticEntryResolver {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry point.
    pub fn register<F, E>(&mut self, entry_point: impl Into<String>, factory: F)
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: PluginEntry + 'static,
    {
        self.factories.insert(
            entry_point.into(),
            Arc::new(move || Box::new(factory()) as Box<dyn PluginEntry>),
        );
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_entry<F, E>(mut self, entry_point: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: PluginEntry + 'static,
    {
        self.register(entry_point, factory);
        self
    }

    /// Known entry points, sorted.
    pub fn entry_points(&self) -> Vec<&str> {
        let mut points: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        points.sort_unstable();
        points
    }
}

impl std::fmt::Debug for StaticEntryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticEntryResolver")
            .field("entry_points", &self.entry_points())
            .finish()
    }
}

impl EntryResolver for StaticEntryResolver {
    fn name(&self) -> &'static str {
        "static"
    }

    fn resolve(
        &self,
        _module: &ModuleSpec,
        entry_point: &str,
    ) -> Result<Option<Box<dyn PluginEntry>>, PluginError> {
        Ok(self.factories.get(entry_point).map(|factory| factory()))
    }
}
