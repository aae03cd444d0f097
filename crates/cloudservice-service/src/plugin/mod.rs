//! Plugin administration services.

pub mod admin;
pub mod view;

pub use admin::{HookSummary, PluginAdminService};
pub use view::PluginView;
