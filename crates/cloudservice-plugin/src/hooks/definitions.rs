//! Hook point definitions.

use serde::{Deserialize, Serialize};

/// Every extension point a plugin can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Renders HTML previews for files of a given MIME type.
    FilePreviewProvider,
    /// Contributes a widget to the dashboard.
    #[serde(rename = "ui_dashboard_widget")]
    DashboardWidget,
}

/// The kind of handler a hook point accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCapability {
    /// Handler implements `FilePreviewProvider`.
    PreviewProvider,
    /// Handler implements `DashboardWidgetProvider`.
    DashboardWidget,
}

impl HookCapability {
    /// Human-readable name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreviewProvider => "preview provider",
            Self::DashboardWidget => "dashboard widget",
        }
    }
}

impl HookPoint {
    /// All hook points.
    pub const ALL: [HookPoint; 2] = [Self::FilePreviewProvider, Self::DashboardWidget];

    /// Returns the manifest name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilePreviewProvider => "file_preview_provider",
            Self::DashboardWidget => "ui_dashboard_widget",
        }
    }

    /// The handler capability registrations for this hook must provide.
    pub fn capability(&self) -> HookCapability {
        match self {
            Self::FilePreviewProvider => HookCapability::PreviewProvider,
            Self::DashboardWidget => HookCapability::DashboardWidget,
        }
    }

    /// Whether registrations for this hook point carry a MIME filter key.
    pub fn is_mime_filtered(&self) -> bool {
        matches!(self, Self::FilePreviewProvider)
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| format!("unknown hook point '{s}'"))
    }
}
