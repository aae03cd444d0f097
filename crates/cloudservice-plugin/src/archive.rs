//! Plugin archive validation and extraction.
//!
//! Archives are zip files carrying a `plugin.json` manifest either at the
//! root or under a single wrapper directory. Validation reads only the
//! central directory and the manifest; extraction writes into a staging
//! directory and swaps it into place, so a destination is never left with
//! a half-written or mixed-depth tree.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

use cloudservice_core::config::PluginConfig;
use cloudservice_entity::plugin::PluginManifest;

use crate::error::PluginError;
use crate::hooks::HookPoint;

/// Buffer size for member copies.
const BUFFER_SIZE: usize = 64 * 1024;

/// Shared library extensions, accepted when native libraries are allowed.
const NATIVE_LIBRARY_EXTENSIONS: [&str; 3] = ["so", "dll", "dylib"];

/// Upper bound on the manifest file itself.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Limits applied to every archive.
#[derive(Debug, Clone)]
pub struct ArchiveLimits {
    /// Manifest file name.
    pub manifest_file: String,
    /// Maximum archive size in bytes.
    pub max_archive_bytes: u64,
    /// Maximum number of members.
    pub max_entries: usize,
    /// Maximum total uncompressed size in bytes.
    pub max_extracted_bytes: u64,
    /// Lowercase extensions (without dot) that are refused.
    pub blocked_extensions: Vec<String>,
}

impl From<&PluginConfig> for ArchiveLimits {
    fn from(config: &PluginConfig) -> Self {
        Self {
            manifest_file: config.manifest_file.clone(),
            max_archive_bytes: config.max_archive_bytes,
            max_entries: config.max_archive_entries,
            max_extracted_bytes: config.max_extracted_bytes,
            blocked_extensions: config
                .blocked_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| {
                    !(config.allow_native_libraries && NATIVE_LIBRARY_EXTENSIONS.contains(&e.as_str()))
                })
                .collect(),
        }
    }
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self::from(&PluginConfig::default())
    }
}

/// Outcome of a successful [`validate`].
#[derive(Debug, Clone)]
pub struct ValidatedArchive {
    /// Parsed and checked manifest.
    pub manifest: PluginManifest,
    /// Wrapper directory to strip when every member lives under one.
    pub prefix: Option<String>,
    /// Number of members in the archive.
    pub entries: usize,
}

/// Validate archive bytes and return the manifest.
///
/// The shallowest manifest wins when several are present. Members with a
/// blocked extension or an unsafe path reject the whole archive.
pub fn validate(bytes: &[u8], limits: &ArchiveLimits) -> Result<ValidatedArchive, PluginError> {
    if bytes.len() as u64 > limits.max_archive_bytes {
        return Err(PluginError::ArchiveTooLarge {
            reason: format!(
                "archive is {} bytes, limit is {}",
                bytes.len(),
                limits.max_archive_bytes
            ),
        });
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    if archive.len() > limits.max_entries {
        return Err(PluginError::ArchiveTooLarge {
            reason: format!(
                "archive has {} members, limit is {}",
                archive.len(),
                limits.max_entries
            ),
        });
    }

    let mut total_size = 0u64;
    let mut manifest_at: Option<(usize, usize)> = None;
    let mut top_level: Option<String> = None;
    let mut single_top = true;

    for i in 0..archive.len() {
        let member = archive.by_index_raw(i)?;
        let name = member.name().to_string();

        let enclosed = match member.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(PluginError::BlockedFile {
                    name,
                    reason: "path escapes the plugin directory".to_string(),
                });
            }
        };

        if !member.is_dir() && has_blocked_extension(&enclosed, &limits.blocked_extensions) {
            return Err(PluginError::BlockedFile {
                name,
                reason: "blocked file extension".to_string(),
            });
        }

        total_size += member.size();
        if total_size > limits.max_extracted_bytes {
            return Err(PluginError::ArchiveTooLarge {
                reason: format!(
                    "uncompressed size exceeds {} bytes",
                    limits.max_extracted_bytes
                ),
            });
        }

        let components = normal_components(&enclosed);
        let Some(first) = components.first() else {
            continue;
        };

        // A file directly at the root means there is no wrapper to strip.
        if !member.is_dir() && components.len() == 1 {
            single_top = false;
        }
        match &top_level {
            None => top_level = Some(first.clone()),
            Some(top) if top != first => single_top = false,
            Some(_) => {}
        }

        if !member.is_dir()
            && components.last().map(String::as_str) == Some(limits.manifest_file.as_str())
        {
            let depth = components.len();
            if manifest_at.is_none_or(|(_, best)| depth < best) {
                manifest_at = Some((i, depth));
            }
        }
    }

    let Some((manifest_index, _)) = manifest_at else {
        return Err(PluginError::ManifestMissing {
            file: limits.manifest_file.clone(),
        });
    };

    let mut raw = Vec::new();
    archive
        .by_index(manifest_index)?
        .take(MAX_MANIFEST_BYTES)
        .read_to_end(&mut raw)
        .map_err(|e| PluginError::manifest(format!("unreadable manifest: {e}")))?;

    let manifest = parse_manifest(&raw)?;

    let prefix = if single_top { top_level } else { None };

    debug!(
        slug = %manifest.slug,
        version = %manifest.version,
        entries = archive.len(),
        prefix = ?prefix,
        "Plugin archive validated"
    );

    Ok(ValidatedArchive {
        manifest,
        prefix,
        entries: archive.len(),
    })
}

/// Parse and check manifest bytes, including that every declared hook
/// name is a known hook point.
pub fn parse_manifest(raw: &[u8]) -> Result<PluginManifest, PluginError> {
    let manifest =
        PluginManifest::from_slice(raw).map_err(|e| PluginError::manifest(e.to_string()))?;
    manifest.check().map_err(PluginError::manifest)?;
    for hook in manifest.hooks.keys() {
        hook.parse::<HookPoint>()
            .map_err(|e| PluginError::manifest(format!("hooks.{hook}: {e}")))?;
    }
    Ok(manifest)
}

/// Extract a validated archive into `destination`.
///
/// Members are written to a staging sibling with the wrapper prefix
/// stripped. If the staged tree still consists of a single directory, that
/// directory becomes the plugin root. The staged tree then replaces any
/// existing `destination`. Symlink members are skipped.
pub fn extract(
    bytes: &[u8],
    destination: &Path,
    validated: &ValidatedArchive,
) -> Result<(), PluginError> {
    let fail = |e: std::io::Error| PluginError::extraction(destination, e);

    let parent = destination
        .parent()
        .ok_or_else(|| fail(std::io::Error::other("destination has no parent directory")))?;
    fs::create_dir_all(parent).map_err(fail)?;

    let leaf = destination
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("plugin");
    let staging = parent.join(format!(".{leaf}.staging-{}", Uuid::now_v7().simple()));

    let staged = write_members(bytes, &staging, validated.prefix.as_deref())
        .and_then(|()| staged_root(&staging))
        .and_then(|root| swap_into_place(&root, destination));

    // The staging directory is empty (flattened) or absent on success.
    let _ = fs::remove_dir_all(&staging);

    staged.map_err(fail)?;

    debug!(destination = %destination.display(), "Plugin archive extracted");
    Ok(())
}

/// Write archive bytes to `directory/<slug>-<version>.zip` and return the path.
pub fn retain(
    bytes: &[u8],
    directory: &Path,
    manifest: &PluginManifest,
) -> Result<PathBuf, PluginError> {
    let path = directory.join(format!("{}-{}.zip", manifest.slug, manifest.version));
    fs::create_dir_all(directory)
        .and_then(|()| fs::write(&path, bytes))
        .map_err(|e| PluginError::extraction(&path, e))?;
    Ok(path)
}

fn write_members(bytes: &[u8], staging: &Path, prefix: Option<&str>) -> std::io::Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(std::io::Error::other)?;
    fs::create_dir_all(staging)?;

    let mut buffer = vec![0u8; BUFFER_SIZE];

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(std::io::Error::other)?;

        let enclosed = match member.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => continue,
        };

        if member.is_symlink() {
            warn!(member = %member.name(), "Skipping symlink in plugin archive");
            continue;
        }

        let relative = match prefix {
            Some(prefix) => match enclosed.strip_prefix(prefix) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => enclosed,
            },
            None => enclosed,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out_path = staging.join(&relative);

        if member.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(p) = out_path.parent() {
                fs::create_dir_all(p)?;
            }
            let mut outfile = File::create(&out_path)?;
            loop {
                let n = member.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                outfile.write_all(&buffer[..n])?;
            }
        }
    }

    Ok(())
}

/// The directory that becomes the plugin root: the staging directory
/// itself, or its only child when that child is a directory.
fn staged_root(staging: &Path) -> std::io::Result<PathBuf> {
    let mut children = fs::read_dir(staging)?.collect::<Result<Vec<_>, _>>()?;
    if children.len() == 1 && children[0].file_type()?.is_dir() {
        if let Some(only) = children.pop() {
            return Ok(only.path());
        }
    }
    Ok(staging.to_path_buf())
}

fn swap_into_place(root: &Path, destination: &Path) -> std::io::Result<()> {
    let backup = if destination.exists() {
        let leaf = destination
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("plugin");
        let backup = destination.with_file_name(format!(".{leaf}.old-{}", Uuid::now_v7().simple()));
        fs::rename(destination, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(root, destination) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, destination);
        }
        return Err(e);
    }

    if let Some(backup) = backup {
        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!(path = %backup.display(), error = %e, "Failed to remove replaced plugin tree");
        }
    }
    Ok(())
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str().map(str::to_string),
            _ => None,
        })
        .collect()
}

fn has_blocked_extension(path: &Path, blocked: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| blocked.iter().any(|b| *b == e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manifest_json, zip_bytes};

    fn limits() -> ArchiveLimits {
        ArchiveLimits::default()
    }

    #[test]
    fn test_validate_root_manifest() {
        let bytes = zip_bytes(&[
            ("plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("clock/apps.txt", "entry"),
        ]);
        let validated = validate(&bytes, &limits()).unwrap();
        assert_eq!(validated.manifest.slug, "clock-preview");
        assert_eq!(validated.prefix, None);
        assert_eq!(validated.entries, 2);
    }

    #[test]
    fn test_validate_wrapped_manifest_reports_prefix() {
        let bytes = zip_bytes(&[
            ("clock-1.0.0/plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("clock-1.0.0/clock/apps.txt", "entry"),
        ]);
        let validated = validate(&bytes, &limits()).unwrap();
        assert_eq!(validated.prefix.as_deref(), Some("clock-1.0.0"));
    }

    #[test]
    fn test_shallowest_manifest_wins() {
        let bytes = zip_bytes(&[
            ("vendor/other/plugin.json", &manifest_json("other", "9.9.9")),
            ("plugin.json", &manifest_json("clock-preview", "1.0.0")),
        ]);
        let validated = validate(&bytes, &limits()).unwrap();
        assert_eq!(validated.manifest.slug, "clock-preview");
    }

    #[test]
    fn test_missing_manifest() {
        let bytes = zip_bytes(&[("readme.md", "# hi")]);
        let err = validate(&bytes, &limits()).unwrap_err();
        assert!(matches!(err, PluginError::ManifestMissing { .. }));
    }

    #[test]
    fn test_invalid_manifest_json() {
        let bytes = zip_bytes(&[("plugin.json", "{ not json")]);
        let err = validate(&bytes, &limits()).unwrap_err();
        assert!(matches!(err, PluginError::ManifestInvalid { .. }));
    }

    #[test]
    fn test_manifest_missing_required_field() {
        let bytes = zip_bytes(&[("plugin.json", r#"{"name":"x","slug":"x","version":"1.0.0"}"#)]);
        let err = validate(&bytes, &limits()).unwrap_err();
        match err {
            PluginError::ManifestInvalid { reason } => assert!(reason.contains("entry_point")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_hook_name_rejected() {
        let manifest = serde_json::json!({
            "name": "x",
            "slug": "x",
            "version": "1.0.0",
            "entry_point": "x.apps.XConfig",
            "hooks": { "before_upload": { "handler": "x.handlers.H" } }
        });
        let bytes = zip_bytes(&[("plugin.json", &manifest.to_string())]);
        let err = validate(&bytes, &limits()).unwrap_err();
        match err {
            PluginError::ManifestInvalid { reason } => assert!(reason.contains("before_upload")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let err = validate(b"definitely not a zip", &limits()).unwrap_err();
        assert!(matches!(err, PluginError::InvalidArchive(_)));
    }

    #[test]
    fn test_blocked_extension_rejected() {
        let bytes = zip_bytes(&[
            ("plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("bin/tool.EXE", "MZ"),
        ]);
        let err = validate(&bytes, &limits()).unwrap_err();
        assert!(matches!(err, PluginError::BlockedFile { .. }));
    }

    #[test]
    fn test_native_libraries_allowed_by_config() {
        let bytes = zip_bytes(&[
            ("plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("libclock_preview.so", "ELF"),
        ]);
        assert!(validate(&bytes, &limits()).is_err());

        let config = PluginConfig {
            allow_native_libraries: true,
            ..PluginConfig::default()
        };
        let limits = ArchiveLimits::from(&config);
        assert!(limits.blocked_extensions.contains(&"exe".to_string()));
        assert!(validate(&bytes, &limits).is_ok());
    }

    #[test]
    fn test_entry_limit() {
        let mut limits = limits();
        limits.max_entries = 1;
        let bytes = zip_bytes(&[
            ("plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("a.txt", "a"),
        ]);
        let err = validate(&bytes, &limits).unwrap_err();
        assert!(matches!(err, PluginError::ArchiveTooLarge { .. }));
    }

    #[test]
    fn test_extract_strips_wrapper() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = zip_bytes(&[
            ("clock-1.0.0/plugin.json", &manifest_json("clock-preview", "1.0.0")),
            ("clock-1.0.0/clock/apps.txt", "entry"),
        ]);
        let validated = validate(&bytes, &limits()).unwrap();
        let dest = tmp.path().join("clock_preview");

        extract(&bytes, &dest, &validated).unwrap();

        assert!(dest.join("plugin.json").is_file());
        assert!(dest.join("clock/apps.txt").is_file());
        assert!(!dest.join("clock-1.0.0").exists());
    }

    #[test]
    fn test_extract_replaces_previous_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("clock_preview");
        fs::create_dir_all(dest.join("stale")).unwrap();
        fs::write(dest.join("stale/old.txt"), "old").unwrap();

        let bytes = zip_bytes(&[("plugin.json", &manifest_json("clock-preview", "1.0.1"))]);
        let validated = validate(&bytes, &limits()).unwrap();
        extract(&bytes, &dest, &validated).unwrap();

        assert!(dest.join("plugin.json").is_file());
        assert!(!dest.join("stale").exists());

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "staging and backup trees are removed");
    }

    #[test]
    fn test_retain_names_archive_by_slug_and_version() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = zip_bytes(&[("plugin.json", &manifest_json("clock-preview", "1.2.3"))]);
        let validated = validate(&bytes, &limits()).unwrap();
        let path = retain(&bytes, tmp.path(), &validated.manifest).unwrap();
        assert!(path.ends_with("clock-preview-1.2.3.zip"));
        assert_eq!(fs::read(path).unwrap(), bytes);
    }
}
