//! Typed hook handlers.

use std::sync::Arc;

use super::definitions::HookCapability;
use crate::preview::FilePreviewProvider;
use crate::widget::DashboardWidgetProvider;

/// A handler registered under a hook point.
#[derive(Clone)]
pub enum HookHandler {
    /// Serves `file_preview_provider`.
    PreviewProvider(Arc<dyn FilePreviewProvider>),
    /// Serves `ui_dashboard_widget`.
    DashboardWidget(Arc<dyn DashboardWidgetProvider>),
}

impl HookHandler {
    /// Wraps a preview provider.
    pub fn preview(provider: impl FilePreviewProvider + 'static) -> Self {
        Self::PreviewProvider(Arc::new(provider))
    }

    /// Wraps a dashboard widget.
    pub fn widget(provider: impl DashboardWidgetProvider + 'static) -> Self {
        Self::DashboardWidget(Arc::new(provider))
    }

    /// Capability this handler provides.
    pub fn capability(&self) -> HookCapability {
        match self {
            Self::PreviewProvider(_) => HookCapability::PreviewProvider,
            Self::DashboardWidget(_) => HookCapability::DashboardWidget,
        }
    }

    /// The preview provider, if this is one.
    pub fn as_preview_provider(&self) -> Option<&Arc<dyn FilePreviewProvider>> {
        match self {
            Self::PreviewProvider(p) => Some(p),
            Self::DashboardWidget(_) => None,
        }
    }

    /// The dashboard widget, if this is one.
    pub fn as_widget_provider(&self) -> Option<&Arc<dyn DashboardWidgetProvider>> {
        match self {
            Self::DashboardWidget(w) => Some(w),
            Self::PreviewProvider(_) => None,
        }
    }
}

impl std::fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HookHandler")
            .field(&self.capability().as_str())
            .finish()
    }
}
