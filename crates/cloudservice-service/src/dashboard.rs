//! Dashboard widgets contributed through the `ui_dashboard_widget` hook.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, warn};

use cloudservice_core::types::id::PluginId;
use cloudservice_plugin::hooks::{HookPoint, HookRegistry};
use cloudservice_plugin::widget::{WidgetSize, WidgetViewer};

use crate::context::RequestContext;

/// A widget rendered for one user.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedWidget {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub size: WidgetSize,
    pub order: i32,
    /// Grid classes for `size`.
    pub css_classes: String,
    /// HTML fragment of the widget body.
    pub html: String,
    /// Plugin that registered the widget.
    pub provider: PluginId,
}

/// Collects and renders dashboard widgets.
#[derive(Debug, Clone)]
pub struct DashboardService {
    registry: Arc<HookRegistry>,
}

impl DashboardService {
    /// Creates a new dashboard service.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Renders every widget visible to the caller, lowest `order` first.
    ///
    /// A widget whose render fails or panics is left out.
    pub async fn widgets(&self, ctx: &RequestContext) -> Vec<RenderedWidget> {
        let viewer = WidgetViewer {
            user_id: ctx.user_id,
            username: ctx.username.clone(),
            is_admin: ctx.is_admin(),
        };

        let mut candidates = Vec::new();
        for entry in self.registry.get_handlers(HookPoint::DashboardWidget, None) {
            let Some(widget) = entry.handler.as_widget_provider().cloned() else {
                continue;
            };
            let inspected = std::panic::catch_unwind(AssertUnwindSafe(|| {
                (widget.descriptor(), widget.is_visible(&viewer))
            }));
            match inspected {
                Ok((descriptor, true)) => candidates.push((descriptor, widget, entry.owner)),
                Ok((_, false)) => {}
                Err(_) => error!(plugin_id = %entry.owner, "Dashboard widget panicked while describing itself"),
            }
        }
        // Stable: equal orders keep registry order.
        candidates.sort_by_key(|(descriptor, _, _)| descriptor.order);

        let mut rendered = Vec::with_capacity(candidates.len());
        for (descriptor, widget, owner) in candidates {
            match AssertUnwindSafe(widget.render(&viewer)).catch_unwind().await {
                Ok(Ok(html)) => rendered.push(RenderedWidget {
                    css_classes: descriptor.size.css_classes().to_string(),
                    id: descriptor.id,
                    name: descriptor.name,
                    icon: descriptor.icon,
                    size: descriptor.size,
                    order: descriptor.order,
                    html,
                    provider: owner,
                }),
                Ok(Err(e)) => {
                    warn!(plugin_id = %owner, widget = %descriptor.id, error = %e, "Dashboard widget failed to render");
                }
                Err(_) => {
                    error!(plugin_id = %owner, widget = %descriptor.id, "Dashboard widget panicked");
                }
            }
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloudservice_core::types::id::UserId;
    use cloudservice_entity::user::UserRole;
    use cloudservice_plugin::hooks::HookHandler;
    use cloudservice_plugin::widget::{DashboardWidgetProvider, WidgetDescriptor};

    struct Card {
        id: &'static str,
        order: i32,
        admin_only: bool,
    }

    #[async_trait]
    impl DashboardWidgetProvider for Card {
        fn descriptor(&self) -> WidgetDescriptor {
            WidgetDescriptor::new(self.id, self.id.to_uppercase()).with_order(self.order)
        }

        fn is_visible(&self, viewer: &WidgetViewer) -> bool {
            !self.admin_only || viewer.is_admin
        }

        async fn render(&self, viewer: &WidgetViewer) -> anyhow::Result<String> {
            Ok(format!("<p>{} for {}</p>", self.id, viewer.username))
        }
    }

    struct Failing;

    #[async_trait]
    impl DashboardWidgetProvider for Failing {
        fn descriptor(&self) -> WidgetDescriptor {
            WidgetDescriptor::new("failing", "Failing").with_order(0)
        }

        async fn render(&self, _viewer: &WidgetViewer) -> anyhow::Result<String> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct Panicky;

    #[async_trait]
    impl DashboardWidgetProvider for Panicky {
        fn descriptor(&self) -> WidgetDescriptor {
            WidgetDescriptor::new("panicky", "Panicky")
        }

        async fn render(&self, _viewer: &WidgetViewer) -> anyhow::Result<String> {
            panic!("widget bug")
        }
    }

    fn register(registry: &HookRegistry, widget: impl DashboardWidgetProvider + 'static) -> PluginId {
        let owner = PluginId::new();
        registry
            .register(HookPoint::DashboardWidget, HookHandler::widget(widget), owner, 10, None)
            .unwrap();
        owner
    }

    fn user() -> RequestContext {
        RequestContext::new(UserId::new(), UserRole::User, "alice")
    }

    #[tokio::test]
    async fn test_widgets_sorted_by_order() {
        let registry = Arc::new(HookRegistry::default());
        register(&registry, Card { id: "later", order: 50, admin_only: false });
        let first = register(&registry, Card { id: "first", order: 5, admin_only: false });
        register(&registry, Card { id: "tie", order: 50, admin_only: false });

        let widgets = DashboardService::new(registry).widgets(&user()).await;
        let ids: Vec<_> = widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["first", "later", "tie"]);
        assert_eq!(widgets[0].provider, first);
        assert_eq!(widgets[0].name, "FIRST");
        assert_eq!(widgets[0].icon, "bi-grid");
        assert_eq!(widgets[0].css_classes, "col-md-6");
        assert_eq!(widgets[0].html, "<p>first for alice</p>");
    }

    #[tokio::test]
    async fn test_hidden_widgets_are_skipped() {
        let registry = Arc::new(HookRegistry::default());
        register(&registry, Card { id: "admin", order: 1, admin_only: true });
        register(&registry, Card { id: "everyone", order: 2, admin_only: false });
        let service = DashboardService::new(registry);

        let widgets = service.widgets(&user()).await;
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].id, "everyone");

        let admin = RequestContext::new(UserId::new(), UserRole::Admin, "root");
        assert_eq!(service.widgets(&admin).await.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_widgets_are_omitted() {
        let registry = Arc::new(HookRegistry::default());
        register(&registry, Failing);
        register(&registry, Panicky);
        register(&registry, Card { id: "ok", order: 1, admin_only: false });

        let widgets = DashboardService::new(registry).widgets(&user()).await;
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].id, "ok");
    }

    #[tokio::test]
    async fn test_no_widgets() {
        let registry = Arc::new(HookRegistry::default());
        assert!(DashboardService::new(registry).widgets(&user()).await.is_empty());
    }
}
