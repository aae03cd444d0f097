//! Error type for the plugin loader and lifecycle.
//!
//! Archive, runtime and hook errors are consolidated into `PluginError`,
//! which maps onto `cloudservice_core::error::AppError` so that HTTP
//! handlers can propagate it with `?`.

use std::path::PathBuf;

use cloudservice_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Errors raised while validating, extracting, importing or initializing a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    // --- Archive errors ---
    /// The manifest file was not found at any depth of the archive.
    #[error("Archive does not contain a {file} manifest")]
    ManifestMissing {
        /// Manifest file name that was searched for.
        file: String,
    },

    /// The manifest is malformed JSON or fails field validation.
    #[error("Invalid plugin manifest: {reason}")]
    ManifestInvalid {
        /// What was wrong with it.
        reason: String,
    },

    /// The uploaded bytes are not a readable zip container.
    #[error("Invalid plugin archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    /// The archive contains a member that may not be installed: a blocked
    /// extension or a path escaping the plugin directory.
    #[error("Archive member '{name}' is not allowed: {reason}")]
    BlockedFile {
        /// Path of the offending member inside the archive.
        name: String,
        /// Why it was refused.
        reason: String,
    },

    /// The archive exceeds a configured size or member-count limit.
    #[error("Plugin archive exceeds limit: {reason}")]
    ArchiveTooLarge {
        /// Which limit was exceeded.
        reason: String,
    },

    /// Writing the plugin tree to disk failed.
    #[error("Failed to extract plugin into {path}: {source}")]
    ExtractionFailure {
        /// Destination directory.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    // --- Runtime errors ---
    /// The plugin's module could not be imported from the search path.
    #[error("Failed to import plugin module '{module}': {reason}")]
    ImportFailure {
        /// Module name derived from the slug.
        module: String,
        /// Why the import failed.
        reason: String,
    },

    /// No entry resolver knows the manifest's entry point.
    #[error("Unknown entry point '{entry_point}'")]
    UnknownEntryPoint {
        /// The dotted reference from the manifest.
        entry_point: String,
    },

    /// The entry's `ready` hook failed, panicked or timed out, or a
    /// declared handler could not be resolved.
    #[error("Plugin initialization failed: {reason}")]
    InitializationFailure {
        /// Failure description recorded on the plugin.
        reason: String,
    },

    /// A handler was registered under a hook point it cannot serve.
    #[error("Handler for '{hook}' must be a {expected} handler")]
    HandlerMismatch {
        /// Hook point name.
        hook: String,
        /// Capability the hook point requires.
        expected: &'static str,
    },
}

impl PluginError {
    /// Shorthand for a manifest validation failure.
    pub fn manifest(reason: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            reason: reason.into(),
        }
    }

    /// Shorthand for an initialization failure.
    pub fn init(reason: impl Into<String>) -> Self {
        Self::InitializationFailure {
            reason: reason.into(),
        }
    }

    /// Shorthand for an extraction failure at `path`.
    pub fn extraction(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExtractionFailure {
            path: path.into(),
            source,
        }
    }

    /// The `AppError` category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestMissing { .. }
            | Self::ManifestInvalid { .. }
            | Self::InvalidArchive(_)
            | Self::BlockedFile { .. }
            | Self::ArchiveTooLarge { .. }
            | Self::HandlerMismatch { .. } => ErrorKind::Validation,
            Self::ExtractionFailure { .. } => ErrorKind::Storage,
            Self::ImportFailure { .. }
            | Self::UnknownEntryPoint { .. }
            | Self::InitializationFailure { .. } => ErrorKind::Plugin,
        }
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = err.kind();
        AppError::with_source(kind, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_errors_are_validation() {
        let err: AppError = PluginError::manifest("slug is required").into();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("slug is required"));
    }

    #[test]
    fn test_extraction_is_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = PluginError::extraction("/plugins/clock_preview", io).into();
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[test]
    fn test_runtime_errors_are_plugin_kind() {
        let err = PluginError::ImportFailure {
            module: "clock_preview".into(),
            reason: "not on search path".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Plugin);
        assert_eq!(PluginError::init("boom").kind(), ErrorKind::Plugin);
    }
}
