//! HTML fragments shared by the static archive and the search server

use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;

use crate::error::Result;
use crate::models::{DbMedia, DbMessage, Direction, MessageKind};

/// Stylesheet embedded in every page
const CSS: &str = r"<style>
:root{--bg:#0b1020;--card:#121a34;--bubble-in:#1e2a55;--bubble-out:#0e6b3a;--text:#e7ecff;--muted:#a6b0d1;--link:#8ab4ff}
*{box-sizing:border-box}
body{margin:0;padding:2rem;background:var(--bg);color:var(--text);font-family:system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Arial,sans-serif}
a{color:var(--link)}
.container{max-width:1100px;margin:0 auto}
.card{background:var(--card);border-radius:16px;padding:1rem 1.2rem;margin-bottom:1rem}
.header{display:flex;align-items:center;gap:.75rem;margin-bottom:1rem}
.h1{font-size:1.4rem;font-weight:700;margin:0}
.meta{color:var(--muted);font-size:.92rem}
.contact-list{display:grid;grid-template-columns:repeat(auto-fill,minmax(260px,1fr));gap:1rem}
.contact{padding:1rem;border-radius:16px;background:var(--card)}
.contact h3{margin:.2rem 0 .4rem 0}
.thread{display:flex;flex-direction:column;gap:.6rem}
.msg{max-width:75%;padding:.6rem .8rem;border-radius:16px;line-height:1.35}
.in{align-self:flex-start;background:var(--bubble-in)}
.out{align-self:flex-end;background:var(--bubble-out)}
.msg .small{display:block;color:var(--muted);font-size:.8rem;margin-top:.2rem}
.media{margin-top:.35rem;border-radius:12px;overflow:hidden}
.media img{max-width:100%;display:block}
.media video,.media audio{width:100%}
.separator{color:var(--muted);text-align:center;margin:1rem auto .5rem}
.nav{display:flex;gap:.6rem;flex-wrap:wrap;margin-bottom:1rem}
.nav a{background:#1a2244;padding:.4rem .7rem;border-radius:999px;text-decoration:none}
.form{display:flex;gap:.5rem}
.form input{flex:1;padding:.5rem;border-radius:6px;border:1px solid #334}
.footer{color:var(--muted);font-size:.9rem;margin-top:1rem}
</style>";

/// Closing markup matching [`page_start`]
pub const PAGE_END: &str = "\n</div></body></html>\n";

/// Document head and the opening of the page container.
#[must_use]
pub fn page_start(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title>{CSS}</head><body><div class=\"container\">\n",
        encode_text(title)
    )
}

/// Wrap `body` in a complete HTML document.
#[must_use]
pub fn page(title: &str, body: &str) -> String {
    format!("{}{body}{PAGE_END}", page_start(title))
}

/// Page heading block
#[must_use]
pub fn heading(text: &str) -> String {
    format!(
        "<div class=\"header\"><h1 class=\"h1\">{}</h1></div>\n",
        encode_text(text)
    )
}

/// Local date as shown next to a message, `YYYY-MM-DD HH:MM:SS`
#[must_use]
pub fn display_date(message: &DbMessage) -> String {
    message
        .date_iso
        .as_deref()
        .and_then(|iso| iso.get(..19))
        .map(|s| s.replace('T', " "))
        .unwrap_or_default()
}

/// Builds message bodies and bubbles
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    url_regex: Regex,
}

impl HtmlRenderer {
    /// Compile the patterns used for rendering
    pub fn new() -> Result<Self> {
        Ok(Self {
            url_regex: Regex::new(r#"(https?://[^\s<"]+)"#)?,
        })
    }

    /// Escaped text with links and line breaks.
    #[must_use]
    pub fn text_html(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let escaped = encode_text(text);
        let linked = self
            .url_regex
            .replace_all(&escaped, r#"<a href="$1" target="_blank" rel="noopener">$1</a>"#);
        linked.replace('\n', "<br>")
    }

    /// Body of a message, with a placeholder for multimedia messages without text.
    #[must_use]
    pub fn body_html(&self, message: &DbMessage) -> String {
        if message.body.is_empty() && message.kind == MessageKind::Mms {
            return "<em>(MMS without text)</em>".to_string();
        }
        self.text_html(&message.body)
    }

    /// One chat bubble. `media_prefix` is prepended to stored file names.
    #[must_use]
    pub fn bubble(&self, message: &DbMessage, who: &str, media_prefix: &str) -> String {
        let class = match message.direction {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        };
        let mut html = format!("<div class=\"msg {class}\">{}", self.body_html(message));
        for media in &message.media {
            html.push('\n');
            html.push_str(&media_html(media, media_prefix));
        }
        html.push_str(&format!(
            "<span class=\"small\">{} • {}</span></div>\n",
            encode_text(who),
            encode_text(&display_date(message))
        ));
        html
    }
}

/// Markup for one stored attachment, chosen by content type.
#[must_use]
pub fn media_html(media: &DbMedia, media_prefix: &str) -> String {
    let src = format!("{media_prefix}{}", media.filename);
    let src = encode_double_quoted_attribute(&src);
    let content_type = media.content_type.to_ascii_lowercase();
    if content_type.starts_with("image/") {
        format!(
            "<div class=\"media\"><a href=\"{src}\" target=\"_blank\"><img src=\"{src}\" alt=\"{}\"></a></div>",
            encode_double_quoted_attribute(&media.content_type)
        )
    } else if content_type.starts_with("video/") {
        format!("<div class=\"media\"><video controls src=\"{src}\"></video></div>")
    } else if content_type.starts_with("audio/") {
        format!("<div class=\"media\"><audio controls src=\"{src}\"></audio></div>")
    } else {
        let label = if media.original_name.is_empty() {
            &media.content_type
        } else {
            &media.original_name
        };
        format!(
            "<div class=\"media\"><a href=\"{src}\" download>Download {}</a></div>",
            encode_text(label)
        )
    }
}
