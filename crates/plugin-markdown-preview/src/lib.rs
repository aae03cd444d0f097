//! # Plugin Markdown Preview
//!
//! Renders Markdown files (`.md`, `.markdown`) to HTML for the file
//! preview. Raw HTML embedded in the source is shown as text, never
//! passed through.
//!
//! Plain-text files are only claimed when their name carries a Markdown
//! extension, so ordinary `.txt` files keep the built-in preview.

pub mod entry;
pub mod provider;
pub mod render;

use cloudservice_plugin::StaticEntryResolver;

pub use entry::MarkdownPreviewEntry;
pub use provider::{MarkdownPreviewProvider, MarkdownSettings};

/// The plugin's manifest.
pub const MANIFEST: &str = include_str!("../plugin.json");

/// Manifest entry point.
pub const ENTRY_POINT: &str = "markdown_preview.apps.MarkdownPreviewConfig";

/// Adds this plugin's entry point to `catalog`.
pub fn register(catalog: &mut StaticEntryResolver) {
    catalog.register(ENTRY_POINT, MarkdownPreviewEntry::new);
}

#[cfg(feature = "native")]
cloudservice_plugin::export_plugin_entry!(MarkdownPreviewEntry::new());
