//! Plugin manifest (`plugin.json`) schema and validation.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Maximum slug length, matching the `plugins.slug` column.
pub const MAX_SLUG_LEN: usize = 100;

/// Parsed contents of a plugin's manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PluginManifest {
    /// Display name.
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    /// URL-safe unique identifier.
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    /// Semantic version string.
    #[validate(custom(function = "validate_version"))]
    pub version: String,
    /// Author or maintainer.
    #[serde(default)]
    pub author: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Dotted reference to the initialization type, e.g. `clock.apps.ClockConfig`.
    #[validate(custom(function = "validate_reference"))]
    pub entry_point: String,
    /// Hook name -> declaration.
    #[serde(default)]
    pub hooks: BTreeMap<String, HookDeclaration>,
    /// Declared external dependencies. Informational only.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Optional settings block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsDeclaration>,
}

/// The `settings` block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDeclaration {
    /// Whether the plugin exposes a settings form.
    #[serde(default)]
    pub has_settings: bool,
    /// JSON Schema describing the settings object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Settings a fresh install starts with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<serde_json::Value>,
}

/// A hook the plugin declares in its manifest.
///
/// Declarations describe the plugin to operators; the entry's `ready()`
/// decides what is actually registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HookDeclaration {
    /// Dotted reference to the handler type.
    #[validate(custom(function = "validate_reference"))]
    pub handler: String,
    /// Lower runs first. Falls back to the configured default when absent.
    #[validate(range(min = 0, max = 1000, message = "priority must be within 0..=1000"))]
    #[serde(default)]
    pub priority: Option<i32>,
    /// MIME types the handler is registered for. Empty means unfiltered.
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl PluginManifest {
    /// Parse manifest bytes. Structural errors (missing required keys,
    /// malformed JSON) surface as `serde_json::Error`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Run field-level validation on the manifest and every hook declaration.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        for (hook, decl) in &self.hooks {
            decl.validate()
                .map_err(|e| format!("hooks.{hook}: {e}"))?;
            if decl.mime_types.iter().any(|m| m.trim().is_empty()) {
                return Err(format!("hooks.{hook}: mime_types must not contain empty values"));
            }
        }
        if let Some(settings) = &self.settings {
            if settings.schema.as_ref().is_some_and(|s| !s.is_object()) {
                return Err("settings.schema must be an object".to_string());
            }
            if settings.defaults.as_ref().is_some_and(|d| !d.is_object()) {
                return Err("settings.defaults must be an object".to_string());
            }
        }
        Ok(())
    }

    /// Importable module name derived from the slug.
    pub fn module_name(&self) -> String {
        module_name_for(&self.slug)
    }

    /// Whether the plugin exposes a settings form.
    pub fn has_settings(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.has_settings)
    }

    /// The declared settings schema, if any.
    pub fn settings_schema(&self) -> Option<&serde_json::Value> {
        self.settings.as_ref().and_then(|s| s.schema.as_ref())
    }

    /// Default settings declared under `settings.defaults`, or an empty object.
    pub fn default_settings(&self) -> serde_json::Value {
        self.settings
            .as_ref()
            .and_then(|s| s.defaults.clone())
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

/// Map a slug to the module name a plugin is imported under.
pub fn module_name_for(slug: &str) -> String {
    slug.replace('-', "_")
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let mut chars = slug.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if !first_ok || !rest_ok {
        return Err(invalid(
            "slug",
            format!("slug '{slug}' must match [a-z0-9][a-z0-9_-]*"),
        ));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(invalid(
            "slug",
            format!("slug must be at most {MAX_SLUG_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<(), ValidationError> {
    semver::Version::parse(version)
        .map(|_| ())
        .map_err(|e| invalid("version", format!("version '{version}' is not semver: {e}")))
}

fn validate_reference(reference: &str) -> Result<(), ValidationError> {
    let segments: Vec<&str> = reference.split('.').collect();
    let well_formed = segments.len() >= 2
        && segments.iter().all(|s| {
            let mut chars = s.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            "reference",
            format!("'{reference}' is not a dotted reference like 'package.module.Name'"),
        ))
    }
}
