//! Rich-text sanitization for backend-authored HTML.
//!
//! Product descriptions and announcement text arrive either as plain text or
//! as a small HTML fragment. [`sanitize_rich_text`] turns either into markup
//! that is safe to embed with askama's `|safe`:
//!
//! - plain text is escaped and line breaks become `<br>`
//! - HTML is parsed and rebuilt keeping only a small set of formatting tags,
//!   with every attribute dropped except a vetted `href` on links
//! - `script` and `style` elements are removed together with their content
//!
//! When the runtime is configured without a markup parser, or the input is
//! too deeply nested to parse, the whole input is escaped instead.

pub mod parse;

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use self::parse::{Node, parse_fragment};

/// Tags that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "u", "br", "p", "div", "span", "ul", "ol", "li", "a",
];

/// Tags removed together with everything inside them.
const REMOVED_TAGS: &[&str] = &["script", "style"];

/// Link schemes and prefixes that are allowed in `href`.
const SAFE_HREF_PREFIXES: &[&str] = &["http://", "https://", "/", "#"];

/// What the runtime can do with markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlCapability {
    /// Parse and filter markup.
    #[default]
    Dom,
    /// No parser available: escape everything.
    EscapeOnly,
}

static TAG_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(?:\s[^<>]*)?/?>").expect("Invalid regex")
});

/// Whether `input` contains something that looks like a tag.
#[must_use]
pub fn looks_like_html(input: &str) -> bool {
    TAG_LIKE.is_match(input)
}

/// Escape `&`, `<`, `>`, `"` and `'`.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    push_escaped(&mut out, input);
    out
}

/// Escape plain text and turn line breaks into `<br>`.
#[must_use]
pub fn text_to_html(input: &str) -> String {
    escape_html(input)
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

/// Render `input` as safe HTML.
///
/// Empty input yields an empty string. Input without any tag is treated as
/// plain text.
#[must_use]
pub fn sanitize_rich_text(input: &str, capability: HtmlCapability) -> String {
    if input.is_empty() {
        return String::new();
    }
    if !looks_like_html(input) {
        return text_to_html(input);
    }
    if capability == HtmlCapability::EscapeOnly {
        return escape_html(input);
    }

    match parse_fragment(input) {
        Ok(nodes) => {
            let mut out = String::with_capacity(input.len());
            render_nodes(&mut out, &nodes);
            out
        }
        Err(e) => {
            warn!(error = %e, "Rich text rejected by parser, escaping");
            escape_html(input)
        }
    }
}

fn render_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => push_escaped(out, text),
            Node::Element {
                name,
                attrs,
                children,
            } => render_element(out, name, attrs, children),
        }
    }
}

fn render_element(out: &mut String, name: &str, attrs: &[(String, String)], children: &[Node]) {
    if REMOVED_TAGS.contains(&name) {
        return;
    }
    if !ALLOWED_TAGS.contains(&name) {
        render_nodes(out, children);
        return;
    }

    out.push('<');
    out.push_str(name);
    if name == "a" {
        let href = attrs
            .iter()
            .find(|(attr, _)| attr == "href")
            .map(|(_, value)| value.trim())
            .filter(|href| is_safe_href(href));
        if let Some(href) = href {
            out.push_str(" href=\"");
            push_escaped(out, href);
            out.push('"');
        }
        out.push_str(" rel=\"noopener noreferrer\" target=\"_blank\"");
    }
    out.push('>');

    if name == "br" {
        return;
    }

    render_nodes(out, children);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Whether an `href` value may be kept.
#[must_use]
pub fn is_safe_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    SAFE_HREF_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
