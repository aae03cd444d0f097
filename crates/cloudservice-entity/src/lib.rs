//! # cloudservice-entity
//!
//! Domain entity models for the CloudService plugin registry. Every struct
//! in this crate represents a database table row or a domain value object.
//! Database entities additionally derive `sqlx::FromRow`.

pub mod plugin;
pub mod plugin_log;
pub mod user;
