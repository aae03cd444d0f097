//! Markdown to HTML.

use pulldown_cmark::{Event, Options, Parser, html};

use cloudservice_plugin::escape_html;

/// Which CommonMark extensions are enabled.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub tables: bool,
    pub footnotes: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
        }
    }
}

impl RenderOptions {
    fn to_cmark(self) -> Options {
        let mut options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        if self.tables {
            options |= Options::ENABLE_TABLES;
        }
        if self.footnotes {
            options |= Options::ENABLE_FOOTNOTES;
        }
        options
    }
}

/// Renders `source` to an HTML fragment. Embedded HTML is escaped.
pub fn markdown_to_html(source: &str, options: RenderOptions) -> String {
    let parser = Parser::new_ext(source, options.to_cmark()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wraps rendered markdown in the preview container.
pub fn wrap(body: &str, title: &str) -> String {
    format!(
        r#"<div class="markdown-preview" data-file="{title}"><style>{STYLE}</style>{body}</div>"#,
        title = escape_html(title),
    )
}

const STYLE: &str = "\
.markdown-preview{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Helvetica,Arial,sans-serif;\
line-height:1.6;color:#24292e;padding:20px;max-width:900px;margin:0 auto}\
.markdown-preview h1,.markdown-preview h2{border-bottom:1px solid #eaecef;padding-bottom:.3em}\
.markdown-preview code{background:rgba(27,31,35,.05);border-radius:3px;padding:.2em .4em;\
font-family:'SFMono-Regular',Consolas,monospace;font-size:85%}\
.markdown-preview pre{background:#f6f8fa;border-radius:6px;padding:16px;overflow:auto}\
.markdown-preview pre code{background:transparent;padding:0}\
.markdown-preview blockquote{border-left:.25em solid #dfe2e5;color:#6a737d;padding:0 1em;margin:0}\
.markdown-preview table{border-collapse:collapse;width:100%}\
.markdown-preview th,.markdown-preview td{border:1px solid #dfe2e5;padding:6px 13px}\
.markdown-preview tr:nth-child(2n){background:#f6f8fa}\
.markdown-preview img{max-width:100%}";
