//! Dashboard widget contract.
//!
//! Widgets are registered under the `ui_dashboard_widget` hook point and
//! shown on the dashboard of every signed-in user, ordered by
//! [`WidgetDescriptor::order`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cloudservice_core::types::id::UserId;

/// Icon used when a widget does not pick one.
pub const DEFAULT_ICON: &str = "bi-grid";

/// Order used when a widget does not pick one. Lower shows first.
pub const DEFAULT_ORDER: i32 = 100;

/// Width of a widget on the dashboard grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl WidgetSize {
    /// Grid classes for this size.
    pub fn css_classes(&self) -> &'static str {
        match self {
            Self::Small => "col-md-4",
            Self::Medium => "col-md-6",
            Self::Large => "col-md-12",
        }
    }
}

/// Static metadata of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    /// Unique widget identifier.
    pub id: String,
    /// Title shown in the widget header.
    pub name: String,
    /// Icon class.
    pub icon: String,
    pub size: WidgetSize,
    /// Lower shows first.
    pub order: i32,
}

impl WidgetDescriptor {
    /// A medium widget with the default icon and order.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: DEFAULT_ICON.to_string(),
            size: WidgetSize::default(),
            order: DEFAULT_ORDER,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_size(mut self, size: WidgetSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

/// The user a widget is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetViewer {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

/// A plugin component that contributes a dashboard widget.
#[async_trait]
pub trait DashboardWidgetProvider: Send + Sync {
    /// Identifier, title and layout of the widget.
    fn descriptor(&self) -> WidgetDescriptor;

    /// Whether `viewer` should see the widget at all.
    fn is_visible(&self, _viewer: &WidgetViewer) -> bool {
        true
    }

    /// Render the widget body to an HTML fragment.
    async fn render(&self, viewer: &WidgetViewer) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let widget = WidgetDescriptor::new("stats", "Statistics");
        assert_eq!(widget.icon, DEFAULT_ICON);
        assert_eq!(widget.size, WidgetSize::Medium);
        assert_eq!(widget.order, DEFAULT_ORDER);
        assert_eq!(widget.size.css_classes(), "col-md-6");

        let small = widget.with_size(WidgetSize::Small).with_order(5);
        assert_eq!(small.size.css_classes(), "col-md-4");
        assert_eq!(small.order, 5);
        assert_eq!(WidgetSize::Large.css_classes(), "col-md-12");
    }

    #[test]
    fn test_size_serializes_lowercase() {
        assert_eq!(serde_json::to_value(WidgetSize::Small).unwrap(), "small");
        let size: WidgetSize = serde_json::from_value(serde_json::json!("large")).unwrap();
        assert_eq!(size, WidgetSize::Large);
    }
}
