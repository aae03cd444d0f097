//! Dashboard clock.

use async_trait::async_trait;

use cloudservice_plugin::preview::escape_html;
use cloudservice_plugin::widget::{
    DashboardWidgetProvider, WidgetDescriptor, WidgetSize, WidgetViewer,
};

/// Registration priority of the widget.
pub const WIDGET_PRIORITY: i32 = 5;

/// Identifier of the widget.
pub const WIDGET_ID: &str = "clock_widget";

/// A digital clock on the dashboard, ticking in the viewer's local time.
#[derive(Debug, Clone, Default)]
pub struct ClockWidget {
    caption: String,
}

impl ClockWidget {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }
}

#[async_trait]
impl DashboardWidgetProvider for ClockWidget {
    fn descriptor(&self) -> WidgetDescriptor {
        WidgetDescriptor::new(WIDGET_ID, "Clock")
            .with_icon("bi-clock")
            .with_size(WidgetSize::Small)
            .with_order(5)
    }

    async fn render(&self, viewer: &WidgetViewer) -> anyhow::Result<String> {
        Ok(format!(
            r#"<div class="clock-widget" data-user="{user}">
<div class="clock-widget-time" id="clock-widget-time">--:--:--</div>
<div class="clock-widget-caption">{caption}</div>
</div>
<script>{SCRIPT}</script>"#,
            user = escape_html(&viewer.username),
            caption = escape_html(&self.caption),
        ))
    }
}

const SCRIPT: &str = "\
(function(){\
function pad(n){return String(n).padStart(2,'0');}\
function tick(){var d=new Date(),t=document.getElementById('clock-widget-time');\
if(t){t.textContent=pad(d.getHours())+':'+pad(d.getMinutes())+':'+pad(d.getSeconds());}}\
tick();setInterval(tick,1000);})();";

#[cfg(test)]
mod tests {
    use super::*;
    use cloudservice_core::types::id::UserId;

    #[test]
    fn test_descriptor() {
        let descriptor = ClockWidget::default().descriptor();
        assert_eq!(descriptor.id, WIDGET_ID);
        assert_eq!(descriptor.icon, "bi-clock");
        assert_eq!(descriptor.size.css_classes(), "col-md-4");
        assert_eq!(descriptor.order, 5);
    }

    #[tokio::test]
    async fn test_render_escapes_viewer_and_caption() {
        let viewer = WidgetViewer {
            user_id: UserId::new(),
            username: "o'neil".into(),
            is_admin: false,
        };
        let html = ClockWidget::new("<b>Office</b>").render(&viewer).await.unwrap();
        assert!(html.contains("data-user=\"o&#39;neil\""));
        assert!(html.contains("&lt;b&gt;Office&lt;/b&gt;"));
        assert!(html.contains("id=\"clock-widget-time\""));
    }
}
