//! Minimal HTML tree builder.
//!
//! Good enough for user-authored rich text: start/end/self-closing tags with
//! quoted or bare attributes, void elements, raw-text `script`/`style`
//! bodies, and implied closing of unclosed elements. Comments, doctypes and
//! processing instructions are dropped. Anything that does not look like a
//! tag stays text.

use std::sync::LazyLock;

use regex::Regex;

/// Nesting depth beyond which input is rejected.
pub const MAX_DEPTH: usize = 256;

/// A parsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with lowercase tag name.
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<Node>,
    },
    /// Decoded character data.
    Text(String),
}

/// Input the tree builder refuses to handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("elements nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Comments, doctypes/CDATA, processing instructions, or a tag.
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("Invalid regex")
});

/// A single `name`, `name=value`, `name="value"` or `name='value'`.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("Invalid regex")
});

/// `&name;`, `&#123;` or `&#x1F;`.
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[xX]([0-9a-fA-F]{1,6})|#([0-9]{1,7})|([A-Za-z]+));").expect("Invalid regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse `input` into a forest of nodes.
///
/// # Errors
///
/// Returns [`ParseError::TooDeep`] if elements nest deeper than [`MAX_DEPTH`].
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, ParseError> {
    let mut builder = TreeBuilder::default();
    let mut cursor = 0;

    while let Some(caps) = MARKUP_RE.captures_at(input, cursor) {
        let Some(whole) = caps.get(0) else { break };
        builder.text(input.get(cursor..whole.start()).unwrap_or_default());
        cursor = whole.end();

        // Comment, doctype or processing instruction: drop it.
        let Some(name) = caps.get(2) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        let is_end = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

        if is_end {
            builder.close(&name);
            continue;
        }

        let attrs = parse_attributes(caps.get(3).map_or("", |m| m.as_str()));

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !self_closing {
            let (body, resume) = raw_text_body(input, cursor, &name);
            builder.leaf(Node::Element {
                name,
                attrs,
                children: vec![Node::Text(body.to_owned())],
            })?;
            cursor = resume;
        } else if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            builder.leaf(Node::Element {
                name,
                attrs,
                children: Vec::new(),
            })?;
        } else {
            builder.open(name, attrs)?;
        }
    }

    builder.text(input.get(cursor..).unwrap_or_default());
    Ok(builder.finish())
}

/// Body of a raw-text element and the offset just past its end tag.
///
/// An unterminated element swallows the rest of the input.
fn raw_text_body<'a>(input: &'a str, start: usize, name: &str) -> (&'a str, usize) {
    let rest = input.get(start..).unwrap_or_default();
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{name}");

    match lower.find(&needle) {
        Some(offset) => {
            let body = rest.get(..offset).unwrap_or_default();
            let after_tag = lower
                .get(offset..)
                .and_then(|tail| tail.find('>'))
                .map_or(input.len(), |gt| start + offset + gt + 1);
            (body, after_tag)
        }
        None => (rest, input.len()),
    }
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value)))
        })
        .collect()
}

/// Decode the character references that matter for text and URLs.
///
/// Unknown named references are left untouched.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }

    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| named_entity(name.as_str()))
            };

            decoded.map_or_else(
                || caps.get(0).map_or(String::new(), |m| m.as_str().to_owned()),
                String::from,
            )
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Stack-based tree construction.
#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    open: Vec<(String, Vec<(String, String)>, Vec<Node>)>,
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some((_, _, children)) => children,
            None => &mut self.root,
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        let siblings = self.current();
        if let Some(Node::Text(previous)) = siblings.last_mut() {
            previous.push_str(&decoded);
        } else {
            siblings.push(Node::Text(decoded));
        }
    }

    fn leaf(&mut self, node: Node) -> Result<(), ParseError> {
        if self.open.len() >= MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }
        self.current().push(node);
        Ok(())
    }

    fn open(&mut self, name: String, attrs: Vec<(String, String)>) -> Result<(), ParseError> {
        if self.open.len() >= MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }
        self.open.push((name, attrs, Vec::new()));
        Ok(())
    }

    /// Close the innermost open element named `name`, closing anything
    /// opened inside it. Stray end tags are ignored.
    fn close(&mut self, name: &str) {
        let Some(position) = self.open.iter().rposition(|(open, _, _)| open == name) else {
            return;
        };
        while self.open.len() > position {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some((name, attrs, children)) = self.open.pop() {
            self.current().push(Node::Element {
                name,
                attrs,
                children,
            });
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.open.is_empty() {
            self.pop();
        }
        self.root
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn element(name: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
        Node::Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            children,
        }
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn test_nested_elements() {
        let nodes = parse_fragment("<p>Fresh <B>milk</B></p>").unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "p",
                &[],
                vec![text("Fresh "), element("b", &[], vec![text("milk")])]
            )]
        );
    }

    #[test]
    fn test_attribute_forms() {
        let nodes =
            parse_fragment(r#"<a HREF="/x" title='t' data-x=1 hidden>go</a>"#).unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "a",
                &[("href", "/x"), ("title", "t"), ("data-x", "1"), ("hidden", "")],
                vec![text("go")]
            )]
        );
    }

    #[test]
    fn test_void_and_self_closing() {
        let nodes = parse_fragment("a<br>b<span/>c").unwrap();
        assert_eq!(
            nodes,
            vec![
                text("a"),
                element("br", &[], vec![]),
                text("b"),
                element("span", &[], vec![]),
                text("c"),
            ]
        );
    }

    #[test]
    fn test_script_body_is_raw_text() {
        let nodes = parse_fragment("<script>if (a < b) { x('<b>') }</SCRIPT>after").unwrap();
        assert_eq!(
            nodes,
            vec![
                element("script", &[], vec![text("if (a < b) { x('<b>') }")]),
                text("after"),
            ]
        );
    }

    #[test]
    fn test_unterminated_script_swallows_rest() {
        let nodes = parse_fragment("ok<style>body{}").unwrap();
        assert_eq!(
            nodes,
            vec![text("ok"), element("style", &[], vec![text("body{}")])]
        );
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let nodes = parse_fragment("<div><p>one</div></span>two").unwrap();
        assert_eq!(
            nodes,
            vec![
                element("div", &[], vec![element("p", &[], vec![text("one")])]),
                text("two"),
            ]
        );
    }

    #[test]
    fn test_comments_and_doctype_dropped() {
        let nodes = parse_fragment("<!DOCTYPE html><!-- <b>hidden</b> -->shown").unwrap();
        assert_eq!(nodes, vec![text("shown")]);
    }

    #[test]
    fn test_non_tags_stay_text() {
        let nodes = parse_fragment("2 < 3 and <3 milk").unwrap();
        assert_eq!(nodes, vec![text("2 < 3 and <3 milk")]);
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#106;&#x61;"), "ja");
        assert_eq!(decode_entities("&unknown; &"), "&unknown; &");
    }

    #[test]
    fn test_depth_limit() {
        let deep = "<span>".repeat(MAX_DEPTH + 1);
        assert_eq!(parse_fragment(&deep), Err(ParseError::TooDeep));

        let fine = "<span>".repeat(MAX_DEPTH);
        assert!(parse_fragment(&fine).is_ok());
    }
}
