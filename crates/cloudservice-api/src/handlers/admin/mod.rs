//! Admin-only handlers.

pub mod plugins;
