//! # cloudservice-plugin
//!
//! Plugin runtime for CloudService. Provides:
//!
//! - Archive validation and staged extraction
//! - Hot activation and deactivation with durable status and audit log
//! - Hook registry with priority-ordered, MIME-filtered registrations
//! - The file preview provider and dashboard widget contracts
//! - Entry resolution from an in-process catalog, or native libraries
//!   with the `dynamic` feature

pub mod archive;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod preview;
pub mod runtime;
pub mod widget;

#[cfg(test)]
pub(crate) mod testing;

pub use entry::{EntryContext, HookRegistrar, PluginEntry};
pub use error::PluginError;
pub use hooks::{HookHandler, HookPoint, HookRegistry};
pub use manager::PluginManager;
pub use preview::{FileDescriptor, FilePreviewProvider, PreviewError, escape_html};
pub use runtime::{EntryResolver, StaticEntryResolver};
pub use widget::{DashboardWidgetProvider, WidgetDescriptor, WidgetSize, WidgetViewer};
