//! # cloudservice-service
//!
//! Business logic service layer for CloudService. Services sit between the
//! HTTP handlers and the plugin runtime: they check who is acting, shape
//! results for callers, apply the preview resolution policy, and render
//! dashboard widgets.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod context;
pub mod dashboard;
pub mod plugin;
pub mod preview;

pub use context::RequestContext;
pub use dashboard::{DashboardService, RenderedWidget};
pub use plugin::{PluginAdminService, PluginView};
pub use preview::{PreviewService, RenderedPreview};
