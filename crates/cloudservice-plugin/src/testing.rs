//! Fixtures shared by the unit tests of this crate.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Build an in-memory zip archive from `(path, contents)` pairs.
pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A manifest for `slug` with the given entry point and one preview
/// provider declaration.
pub(crate) fn manifest_with_entry(slug: &str, version: &str, entry_point: &str) -> String {
    serde_json::json!({
        "name": slug,
        "slug": slug,
        "version": version,
        "entry_point": entry_point,
        "hooks": {
            "file_preview_provider": {
                "handler": "demo.handlers.DemoProvider",
                "mime_types": ["application/x-demo"]
            }
        }
    })
    .to_string()
}

/// A minimal valid manifest for `slug`.
pub(crate) fn manifest_json(slug: &str, version: &str) -> String {
    manifest_with_entry(slug, version, "demo.apps.DemoConfig")
}
