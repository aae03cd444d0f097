//! Installed plugin domain entities.

pub mod manifest;
pub mod model;
pub mod position;
pub mod status;
pub mod transition;

pub use manifest::{HookDeclaration, PluginManifest, SettingsDeclaration};
pub use model::{CreatePlugin, Plugin};
pub use position::PluginPosition;
pub use status::PluginStatus;
pub use transition::StatusChange;
