//! The clock preview provider.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use cloudservice_plugin::preview::{
    FileDescriptor, FilePreviewProvider, PreviewError, escape_html,
};

/// MIME types the clock renders.
pub const SUPPORTED_MIME_TYPES: [&str; 1] = ["application/plugin"];

/// Plugin settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Show the digital readout under the dial.
    pub show_digital: bool,
    /// Caption under the clock.
    pub caption: String,
    /// Also contribute a clock to the dashboard.
    pub dashboard_widget: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            show_digital: true,
            caption: "CloudService Plugin System Test Clock".to_string(),
            dashboard_widget: false,
        }
    }
}

/// Renders an analog clock that follows the viewer's local time.
#[derive(Debug, Clone, Default)]
pub struct ClockPreviewProvider {
    settings: ClockSettings,
}

impl ClockPreviewProvider {
    /// Creates a provider with the given settings.
    pub fn new(settings: ClockSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl FilePreviewProvider for ClockPreviewProvider {
    fn supported_mime_types(&self) -> Vec<String> {
        SUPPORTED_MIME_TYPES.iter().map(|m| m.to_string()).collect()
    }

    async fn render_preview(&self, file: &FileDescriptor) -> Result<String, PreviewError> {
        info!(file = %file.id, "Generating clock preview");

        let digital = if self.settings.show_digital {
            r#"<div class="digital-time" id="clock-digital">00:00:00</div>"#
        } else {
            ""
        };

        Ok(format!(
            r#"<div class="clock-container" data-file="{name}">
<style>{STYLE}</style>
<div class="clock-face">
<div class="clock"><div class="number" id="clock-numbers"></div>
<div class="hand hour-hand" id="clock-hour"></div>
<div class="hand minute-hand" id="clock-minute"></div>
<div class="hand second-hand" id="clock-second"></div></div>
{digital}
<div class="clock-info">{caption}</div>
</div>
</div>
<script>{SCRIPT}</script>"#,
            name = escape_html(&file.name),
            caption = escape_html(&self.settings.caption),
        ))
    }
}

const STYLE: &str = "\
.clock-container{display:flex;justify-content:center;align-items:center;padding:40px;\
background:linear-gradient(135deg,#667eea 0%,#764ba2 100%);border-radius:10px;min-height:400px}\
.clock-face{text-align:center}\
.clock{width:300px;height:300px;border:8px solid #fff;border-radius:50%;position:relative;\
background:#fff;box-shadow:0 0 30px rgba(0,0,0,.3),inset 0 0 20px rgba(0,0,0,.1)}\
.clock::before{content:'';position:absolute;width:15px;height:15px;background:#333;border-radius:50%;\
top:50%;left:50%;transform:translate(-50%,-50%);z-index:10}\
.hand{position:absolute;bottom:50%;left:50%;transform-origin:bottom center;border-radius:10px}\
.hour-hand{width:6px;height:80px;margin-left:-3px;background:#333}\
.minute-hand{width:4px;height:110px;margin-left:-2px;background:#555}\
.second-hand{width:2px;height:120px;margin-left:-1px;background:#e74c3c}\
.number{position:absolute;width:100%;height:100%;font-size:20px;font-weight:bold;color:#333}\
.number span{position:absolute;left:50%;transform-origin:0 150px}\
.digital-time{margin-top:30px;font-size:24px;color:#fff;font-family:'Courier New',monospace;letter-spacing:2px}\
.clock-info{margin-top:20px;color:rgba(255,255,255,.8);font-size:14px}";

const SCRIPT: &str = "\
(function(){\
var nums=document.getElementById('clock-numbers');\
for(var i=1;i<=12;i++){var s=document.createElement('span');s.textContent=i;\
s.style.transform='translateX(-50%) rotate('+(i*30)+'deg)';nums.appendChild(s);}\
function pad(n){return String(n).padStart(2,'0');}\
function tick(){var d=new Date(),s=d.getSeconds(),m=d.getMinutes(),h=d.getHours();\
document.getElementById('clock-second').style.transform='rotate('+(s*6)+'deg)';\
document.getElementById('clock-minute').style.transform='rotate('+(m*6+s/10)+'deg)';\
document.getElementById('clock-hour').style.transform='rotate('+((h%12)*30+m/2)+'deg)';\
var t=document.getElementById('clock-digital');if(t){t.textContent=pad(h)+':'+pad(m)+':'+pad(s);}}\
tick();setInterval(tick,1000);})();";
