//! # Plugin Clock Preview
//!
//! A CloudService plugin that renders an animated analog clock as the
//! preview of `application/plugin` files, and optionally a small clock on
//! the dashboard. It needs no real content, which makes it a convenient
//! smoke test for upload, activation, and preview resolution.
//!
//! The crate ships its own `plugin.json`; zip that file to get an
//! uploadable archive. The entry point is registered with a
//! [`StaticEntryResolver`] through [`register`], or exported as a native
//! symbol with the `native` feature.

pub mod entry;
pub mod provider;
pub mod widget;

use cloudservice_plugin::StaticEntryResolver;

pub use entry::ClockPreviewEntry;
pub use provider::{ClockPreviewProvider, ClockSettings};
pub use widget::ClockWidget;

/// The plugin's manifest.
pub const MANIFEST: &str = include_str!("../plugin.json");

/// Manifest entry point.
pub const ENTRY_POINT: &str = "clock_preview.apps.ClockPreviewConfig";

/// Adds this plugin's entry point to `catalog`.
pub fn register(catalog: &mut StaticEntryResolver) {
    catalog.register(ENTRY_POINT, ClockPreviewEntry::new);
}

#[cfg(feature = "native")]
cloudservice_plugin::export_plugin_entry!(ClockPreviewEntry::new());
