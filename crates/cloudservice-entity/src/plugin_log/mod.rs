//! Plugin audit log domain entities.

pub mod model;

pub use model::{CreatePluginLog, PluginAction, PluginLog, PluginLogFilter};
