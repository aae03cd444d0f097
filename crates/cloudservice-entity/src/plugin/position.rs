//! Where a plugin's output sits on the file preview page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column of the file preview page a plugin renders into.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "plugin_position", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PluginPosition {
    #[default]
    Left,
    Center,
    Right,
}

impl PluginPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for PluginPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginPosition {
    type Err = cloudservice_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(cloudservice_core::AppError::validation(format!(
                "Invalid plugin position: '{s}'. Expected one of: left, center, right"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_left() {
        assert_eq!(PluginPosition::default(), PluginPosition::Left);
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("Center".parse::<PluginPosition>().unwrap(), PluginPosition::Center);
        assert!("top".parse::<PluginPosition>().is_err());
        assert_eq!(serde_json::to_value(PluginPosition::Right).unwrap(), "right");
    }
}
