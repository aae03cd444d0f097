//! # cloudservice-database
//!
//! Persistence for the plugin registry: the [`PluginStore`] seam, its
//! PostgreSQL implementation, and an in-memory implementation used for
//! tests and single-node development.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryPluginStore;
pub use repositories::plugin::PgPluginStore;
pub use store::PluginStore;
