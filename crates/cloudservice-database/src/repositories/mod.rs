//! Concrete PostgreSQL repository implementations.

pub mod plugin;
pub mod plugin_log;
