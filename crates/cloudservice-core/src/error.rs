//! Error type shared by every CloudService crate.
//!
//! Crate-local errors (plugin archive failures, store failures, token
//! failures) convert into [`AppError`] so handlers and the CLI can treat
//! them uniformly. The HTTP layer decides status codes from [`ErrorKind`].

use std::fmt;
use thiserror::Error;

/// Category of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Plugin, log entry or file does not exist.
    NotFound,
    /// Bearer token missing or rejected.
    Authentication,
    /// Caller lacks the administrator role.
    Authorization,
    /// Bad archive, manifest, settings document or request parameter.
    Validation,
    /// Slug already installed, or a lifecycle race lost against another request.
    Conflict,
    Internal,
    /// Plugin store failure.
    Database,
    /// Filesystem failure under the plugin or data directories.
    Storage,
    Configuration,
    /// A plugin entry failed to import, initialize or render.
    Plugin,
    Serialization,
}

impl ErrorKind {
    /// Upper-snake code used in logs and CLI output.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
            Self::Database => "DATABASE",
            Self::Storage => "STORAGE",
            Self::Configuration => "CONFIGURATION",
            Self::Plugin => "PLUGIN",
            Self::Serialization => "SERIALIZATION",
        }
    }

    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::Authentication
                | Self::Authorization
                | Self::Validation
                | Self::Conflict
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// An error with a kind, a message safe to show to API callers, and an
/// optional cause that is only logged.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

macro_rules! kind_constructors {
    ($($name:ident => $kind:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Shorthand for an [`ErrorKind::", stringify!($kind), "`] error.")]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorKind::$kind, message)
            }
        )+
    };
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach `cause` so it shows up in error chains and logs.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(cause)),
            ..Self::new(kind, message)
        }
    }

    kind_constructors! {
        not_found => NotFound,
        authentication => Authentication,
        authorization => Authorization,
        validation => Validation,
        conflict => Conflict,
        internal => Internal,
        storage => Storage,
        configuration => Configuration,
    }
}

// The cause is not cloneable; clones keep the kind and message only.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self::new(self.kind, self.message.clone())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("JSON error: {err}");
        Self::with_source(ErrorKind::Serialization, message, err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let message = format!("I/O error: {err}");
        Self::with_source(ErrorKind::Storage, message, err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        let message = format!("Invalid configuration: {err}");
        Self::with_source(ErrorKind::Configuration, message, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = AppError::conflict("slug 'clock-preview' already installed");
        assert_eq!(
            err.to_string(),
            "CONFLICT: slug 'clock-preview' already installed"
        );
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(err.source.is_some());
        assert!(err.clone().source.is_none());
    }

    #[test]
    fn test_client_error_split() {
        assert!(ErrorKind::Validation.is_client_error());
        assert!(ErrorKind::Conflict.is_client_error());
        assert!(!ErrorKind::Plugin.is_client_error());
        assert!(!ErrorKind::Database.is_client_error());
    }
}
