//! User domain entities referenced by the plugin registry.

pub mod role;

pub use role::UserRole;
