//! HTML tokenization and tree building into the host document.
//!
//! This is a forgiving loader for page snapshots, not a conforming HTML5
//! parser: unknown end tags are ignored, unclosed elements are closed by the
//! nearest matching end tag, and `<html>`/`<head>`/`<body>` map onto the
//! document's own nodes.

use qf_dom::Document;
use qf_dom::NodeId;
use tracing::debug;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parses raw HTML into a host document.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        let mut builder = TreeBuilder::new();
        builder.run(input);
        builder.document
    }
}

struct TreeBuilder {
    document: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let document = Document::new();
        let body = document.body();
        Self {
            document,
            open: vec![body],
        }
    }

    fn current(&self) -> NodeId {
        self.open
            .last()
            .copied()
            .unwrap_or_else(|| self.document.body())
    }

    fn run(&mut self, input: &str) {
        let bytes = input.as_bytes();
        let mut idx = 0_usize;

        while idx < bytes.len() {
            if bytes[idx] != b'<' {
                let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
                self.text(&input[idx..next]);
                idx = next;
                continue;
            }

            if starts_with(bytes, idx, b"<!--") {
                idx = skip_comment(bytes, idx);
                continue;
            }

            if starts_with(bytes, idx, b"<!") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            }

            if starts_with(bytes, idx, b"<?") {
                idx = skip_processing_instruction(bytes, idx);
                continue;
            }

            let Some((tag, next_idx)) = parse_tag(input, idx) else {
                self.text("<");
                idx = idx.saturating_add(1);
                continue;
            };

            idx = if tag.is_end {
                self.end_tag(&tag.name);
                next_idx
            } else {
                self.start_tag(input, tag, next_idx)
            };
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }
        let text = decode_entities(raw);
        let node = self.document.create_text(&text);
        let parent = self.current();
        self.attach(parent, node);
    }

    fn attach(&mut self, parent: NodeId, node: NodeId) {
        if let Err(error) = self.document.append_child(parent, node) {
            debug!(%parent, %node, %error, "node dropped from snapshot");
        }
    }

    fn start_tag(&mut self, input: &str, tag: ParsedTag, next_idx: usize) -> usize {
        let node = match tag.name.as_str() {
            "html" => self.document.root(),
            "head" => self.document.head(),
            "body" => self.document.body(),
            _ => self.document.create_element(&tag.name),
        };

        for (name, value) in &tag.attributes {
            if let Err(error) = self.document.set_attribute(node, name, value) {
                debug!(%node, attribute = %name, %error, "attribute dropped from snapshot");
            }
        }

        match tag.name.as_str() {
            "html" => return next_idx,
            "head" | "body" => {
                self.open.truncate(1);
                if node != self.document.body() {
                    self.open.push(node);
                }
                return next_idx;
            }
            _ => {}
        }

        let parent = self.current();
        self.attach(parent, node);

        if tag.name == "script" || tag.name == "style" || tag.name == "title" {
            let (raw, after) = read_raw_text_until_end_tag(input, next_idx, &tag.name);
            if !raw.is_empty() {
                let text = self.document.create_text(raw);
                self.attach(node, text);
            }
            return after;
        }

        if !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str()) {
            self.open.push(node);
        }
        next_idx
    }

    fn end_tag(&mut self, name: &str) {
        if matches!(name, "html" | "body") {
            self.open.truncate(1);
            return;
        }

        let position = self
            .open
            .iter()
            .rposition(|node| self.document.tag_name(*node) == Some(name));
        if let Some(position) = position.filter(|position| *position > 0) {
            self.open.truncate(position);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    attributes: Vec<(String, String)>,
    is_end: bool,
    self_closing: bool,
}

fn parse_tag(input: &str, start: usize) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start.saturating_add(1);
    let mut is_end = false;
    if bytes.get(idx).copied() == Some(b'/') {
        is_end = true;
        idx = idx.saturating_add(1);
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }

    if idx == name_start {
        return None;
    }

    let name = input[name_start..idx].to_ascii_lowercase();
    let mut attributes = Vec::new();

    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx).copied() {
            None => return None,
            Some(b'>') => {
                return Some((
                    ParsedTag {
                        name,
                        attributes,
                        is_end,
                        self_closing: false,
                    },
                    idx.saturating_add(1),
                ));
            }
            Some(b'/') if bytes.get(idx.saturating_add(1)).copied() == Some(b'>') => {
                return Some((
                    ParsedTag {
                        name,
                        attributes,
                        is_end,
                        self_closing: true,
                    },
                    idx.saturating_add(2),
                ));
            }
            Some(b'/' | b'=') => idx = idx.saturating_add(1),
            Some(_) => {
                let (attribute, next) = parse_attribute(input, idx)?;
                attributes.push(attribute);
                idx = next;
            }
        }
    }
}

fn parse_attribute(input: &str, start: usize) -> Option<((String, String), usize)> {
    let bytes = input.as_bytes();
    let mut idx = start;
    while idx < bytes.len()
        && !bytes[idx].is_ascii_whitespace()
        && !matches!(bytes[idx], b'=' | b'>' | b'/')
    {
        idx = idx.saturating_add(1);
    }

    if idx == start {
        return None;
    }

    let name = input[start..idx].to_ascii_lowercase();
    let after_name = skip_spaces(bytes, idx);
    if bytes.get(after_name).copied() != Some(b'=') {
        return Some(((name, String::new()), idx));
    }

    let value_start = skip_spaces(bytes, after_name.saturating_add(1));
    match bytes.get(value_start).copied() {
        Some(quote @ (b'"' | b'\'')) => {
            let inner = value_start.saturating_add(1);
            let close = find_byte(bytes, inner, quote)?;
            Some((
                (name, decode_entities(&input[inner..close])),
                close.saturating_add(1),
            ))
        }
        Some(_) => {
            let mut end = value_start;
            while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>' {
                end = end.saturating_add(1);
            }
            Some(((name, decode_entities(&input[value_start..end])), end))
        }
        None => None,
    }
}

fn read_raw_text_until_end_tag<'a>(
    input: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            if let Some((_, end_idx)) = parse_tag(input, idx) {
                return (&input[start..idx], end_idx);
            }
        }

        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }

    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start.saturating_add(4), b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn skip_processing_instruction(bytes: &[u8], start: usize) -> usize {
    if let Some(end) = find_subslice(bytes, start.saturating_add(2), b"?>") {
        return end.saturating_add(2);
    }

    skip_to_gt(bytes, start.saturating_add(2))
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx.saturating_add(1);
        }
        idx = idx.saturating_add(1);
    }

    bytes.len()
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::HtmlParser;

    #[test]
    fn builds_nested_elements_with_attributes() {
        let doc = HtmlParser.parse(
            r#"<html><body><div id="contents" class="grid"><ytd-reel-shelf-renderer is-shorts>
               <a href="/shorts/abc" title="Clip &amp; more">Clip</a></ytd-reel-shelf-renderer></div></body></html>"#,
        );

        let body_children = doc.children(doc.body());
        assert_eq!(body_children.len(), 1);
        let grid = body_children[0];
        assert_eq!(doc.attribute(grid, "id"), Some("contents"));
        assert!(doc.has_class(grid, "grid"));

        let shelf = doc.children(grid)[0];
        assert_eq!(doc.tag_name(shelf), Some("ytd-reel-shelf-renderer"));
        assert_eq!(doc.attribute(shelf, "is-shorts"), Some(""));

        let link = doc.children(shelf)[0];
        assert_eq!(doc.attribute(link, "title"), Some("Clip & more"));
        assert_eq!(doc.text_content(link), "Clip");
    }

    #[test]
    fn head_content_and_raw_text_elements() {
        let doc = HtmlParser.parse(
            "<head><title> Home </title><style>a{b:c}</style></head><body><p>x<script>if (a<b) {}</script></p></body>",
        );
        assert_eq!(doc.children(doc.head()).len(), 2);
        let para = doc.children(doc.body())[0];
        assert_eq!(doc.text_content(para), "xif (a<b) {}");
    }

    #[test]
    fn void_and_self_closing_elements_do_not_nest() {
        let doc = HtmlParser.parse("<div><img src=a.png><br/><span>t</span></div>");
        let div = doc.children(doc.body())[0];
        let tags: Vec<_> = doc
            .children(div)
            .iter()
            .filter_map(|node| doc.tag_name(*node))
            .collect();
        assert_eq!(tags, vec!["img", "br", "span"]);
    }

    #[test]
    fn inline_style_attribute_is_parsed() {
        let doc = HtmlParser.parse(r#"<body style="overflow: auto"><div style='display:flex'></div></body>"#);
        assert_eq!(doc.style_property(doc.body(), "overflow"), Some("auto"));
        let div = doc.children(doc.body())[0];
        assert_eq!(doc.style_property(div, "display"), Some("flex"));
    }

    #[test]
    fn unmatched_end_tags_are_ignored() {
        let doc = HtmlParser.parse("<div></span><p>a</p></div><p>b</p>");
        let tags: Vec<_> = doc
            .children(doc.body())
            .iter()
            .filter_map(|node| doc.tag_name(*node))
            .collect();
        assert_eq!(tags, vec!["div", "p"]);
    }

    #[test]
    fn misplaced_body_tag_reopens_the_body() {
        let doc = HtmlParser.parse(r#"<div><body class="late"><p>a</p></div>"#);
        let tags: Vec<_> = doc
            .children(doc.body())
            .iter()
            .filter_map(|node| doc.tag_name(*node))
            .collect();
        assert_eq!(tags, vec!["div", "p"]);
        assert!(doc.has_class(doc.body(), "late"));
        assert!(doc.children(doc.children(doc.body())[0]).is_empty());
    }
}
