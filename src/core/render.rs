use html_escape::encode_double_quoted_attribute;
use pulldown_cmark::{html, Parser};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Tag allow-list applied to rendered Markdown. Everything else is stripped,
/// including the offending tag's attributes.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "pre", "strong",
    "ul", "h1", "h2", "h3", "p",
];

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"https?://[^\s<"]+"#).expect("Regex should compile"))
}

fn anchor_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)<a\b.*?</a>").expect("Regex should compile"))
}

/// Markdown-render, allow-list-filter, then auto-link bare URLs. Pure and
/// deterministic; `body_html` holds exactly this derivation of `body`.
pub fn render_markdown(body: &str) -> String {
    let mut rendered = String::new();
    html::push_html(&mut rendered, Parser::new(body));

    let clean = ammonia::Builder::default()
        .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
        .clean(&rendered)
        .to_string();

    autolink(&clean)
}

// Anchors produced by the Markdown stage are left alone; only bare URLs in
// the remaining text segments get wrapped.
fn autolink(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in anchor_regex().find_iter(html) {
        out.push_str(&link_bare_urls(&html[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&link_bare_urls(&html[last..]));
    out
}

fn link_bare_urls(segment: &str) -> String {
    url_regex()
        .replace_all(segment, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}
