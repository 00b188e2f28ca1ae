//! CSS selector parsing and matching against the host document.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`), descendant and child
//! combinators, and comma-separated lists. Pseudo-classes, pseudo-elements and
//! sibling combinators are rejected with `css.selector.unsupported`.

use qf_core::QfError;
use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::NodeId;

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<CompoundSelector>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    matcher: Option<(AttributeOperator, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOperator {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl SelectorList {
    pub fn parse(input: &str) -> QfResult<Self> {
        let source = normalize_ws(input);
        if source.is_empty() {
            return Err(QfError::new("css.selector.empty", "selector is empty"));
        }

        let mut selectors = Vec::new();
        for part in split_top_level(&source, ',') {
            selectors.push(parse_complex(part.trim(), &source)?);
        }

        Ok(Self { source, selectors })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        document.is_element(node)
            && self
                .selectors
                .iter()
                .any(|selector| selector.matches(document, node))
    }

    /// Connected matching elements in document order.
    pub fn query_all(&self, document: &Document) -> Vec<NodeId> {
        document
            .elements()
            .into_iter()
            .filter(|node| self.matches(document, *node))
            .collect()
    }

    /// Nearest inclusive ancestor of `node` that matches.
    pub fn closest(&self, document: &Document, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(document.ancestors(node))
            .find(|candidate| self.matches(document, *candidate))
    }
}

/// Parses `selector` and returns the matching elements in document order.
pub fn query_selector_all(document: &Document, selector: &str) -> QfResult<Vec<NodeId>> {
    Ok(SelectorList::parse(selector)?.query_all(document))
}

/// First matching element in document order.
pub fn query_selector(document: &Document, selector: &str) -> QfResult<Option<NodeId>> {
    let list = SelectorList::parse(selector)?;
    Ok(document
        .elements()
        .into_iter()
        .find(|node| list.matches(document, *node)))
}

impl ComplexSelector {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        match self.compounds.len().checked_sub(1) {
            Some(last) => self.matches_from(document, node, last),
            None => false,
        }
    }

    fn matches_from(&self, document: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(document, node) {
            return false;
        }
        let Some(previous) = index.checked_sub(1) else {
            return true;
        };

        match self.combinators[previous] {
            Combinator::Child => document
                .parent(node)
                .is_some_and(|parent| self.matches_from(document, parent, previous)),
            Combinator::Descendant => document
                .ancestors(node)
                .into_iter()
                .any(|ancestor| self.matches_from(document, ancestor, previous)),
        }
    }
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(tag) = document.tag_name(node) else {
            return false;
        };

        if let Some(expected) = &self.tag {
            if expected != "*" && expected != tag {
                return false;
            }
        }

        if let Some(expected) = &self.id {
            if document.attribute(node, "id") != Some(expected.as_str()) {
                return false;
            }
        }

        if !self
            .classes
            .iter()
            .all(|class| document.has_class(node, class))
        {
            return false;
        }

        self.attributes
            .iter()
            .all(|attribute| attribute.matches(document, node))
    }
}

impl AttributeSelector {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(actual) = document.attribute(node, &self.name) else {
            return false;
        };
        let Some((operator, expected)) = &self.matcher else {
            return true;
        };

        match operator {
            AttributeOperator::Equals => actual == expected,
            AttributeOperator::Includes => actual
                .split_ascii_whitespace()
                .any(|entry| entry == expected),
            AttributeOperator::DashMatch => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
            AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttributeOperator::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

fn parse_complex(input: &str, source: &str) -> QfResult<ComplexSelector> {
    if input.is_empty() {
        return Err(invalid(source, "empty selector in list"));
    }

    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();

    loop {
        let (compound, next) = parse_compound(input, idx, source)?;
        compounds.push(compound);
        idx = next;

        let after_ws = skip_spaces(bytes, idx);
        if after_ws >= bytes.len() {
            break;
        }

        let combinator = match bytes[after_ws] {
            b'>' => {
                idx = skip_spaces(bytes, after_ws.saturating_add(1));
                Combinator::Child
            }
            b'+' | b'~' => {
                return Err(QfError::new(
                    "css.selector.unsupported",
                    format!("sibling combinators are not supported in `{source}`"),
                ));
            }
            _ if after_ws > idx => {
                idx = after_ws;
                Combinator::Descendant
            }
            other => {
                return Err(invalid(
                    source,
                    &format!("unexpected `{}` at offset {after_ws}", char::from(other)),
                ));
            }
        };
        combinators.push(combinator);

        if idx >= bytes.len() {
            return Err(invalid(source, "selector ends with a combinator"));
        }
    }

    Ok(ComplexSelector {
        compounds,
        combinators,
    })
}

fn parse_compound(input: &str, start: usize, source: &str) -> QfResult<(CompoundSelector, usize)> {
    let bytes = input.as_bytes();
    let mut idx = start;
    let mut compound = CompoundSelector::default();

    if bytes.get(idx).copied() == Some(b'*') {
        compound.tag = Some("*".to_owned());
        idx = idx.saturating_add(1);
    } else if let Some((name, next)) = read_ident(input, idx) {
        compound.tag = Some(name.to_ascii_lowercase());
        idx = next;
    }

    while idx < bytes.len() {
        match bytes[idx] {
            b'#' => {
                let (name, next) = read_ident(input, idx.saturating_add(1))
                    .ok_or_else(|| invalid(source, "`#` must be followed by an identifier"))?;
                compound.id = Some(name.to_owned());
                idx = next;
            }
            b'.' => {
                let (name, next) = read_ident(input, idx.saturating_add(1))
                    .ok_or_else(|| invalid(source, "`.` must be followed by an identifier"))?;
                compound.classes.push(name.to_owned());
                idx = next;
            }
            b'[' => {
                let (attribute, next) = parse_attribute(input, idx, source)?;
                compound.attributes.push(attribute);
                idx = next;
            }
            b':' => {
                return Err(QfError::new(
                    "css.selector.unsupported",
                    format!("pseudo-classes are not supported in `{source}`"),
                ));
            }
            _ => break,
        }
    }

    if compound.is_empty() {
        return Err(invalid(
            source,
            &format!("expected a simple selector at offset {start}"),
        ));
    }

    Ok((compound, idx))
}

fn parse_attribute(input: &str, open: usize, source: &str) -> QfResult<(AttributeSelector, usize)> {
    let bytes = input.as_bytes();
    let mut idx = skip_spaces(bytes, open.saturating_add(1));
    let (name, next) =
        read_ident(input, idx).ok_or_else(|| invalid(source, "attribute name expected"))?;
    idx = skip_spaces(bytes, next);

    let operator = match (bytes.get(idx).copied(), bytes.get(idx.saturating_add(1)).copied()) {
        (Some(b']'), _) => {
            return Ok((
                AttributeSelector {
                    name: name.to_ascii_lowercase(),
                    matcher: None,
                },
                idx.saturating_add(1),
            ));
        }
        (Some(b'='), _) => {
            idx = idx.saturating_add(1);
            AttributeOperator::Equals
        }
        (Some(prefix), Some(b'=')) => {
            idx = idx.saturating_add(2);
            match prefix {
                b'~' => AttributeOperator::Includes,
                b'|' => AttributeOperator::DashMatch,
                b'^' => AttributeOperator::Prefix,
                b'$' => AttributeOperator::Suffix,
                b'*' => AttributeOperator::Substring,
                _ => return Err(invalid(source, "unknown attribute operator")),
            }
        }
        _ => return Err(invalid(source, "unterminated attribute selector")),
    };

    idx = skip_spaces(bytes, idx);
    let (value, next) = match bytes.get(idx).copied() {
        Some(quote @ (b'"' | b'\'')) => {
            let value_start = idx.saturating_add(1);
            let close = input[value_start..]
                .find(char::from(quote))
                .map(|offset| value_start + offset)
                .ok_or_else(|| invalid(source, "unterminated attribute value"))?;
            (&input[value_start..close], close.saturating_add(1))
        }
        _ => read_ident(input, idx).ok_or_else(|| invalid(source, "attribute value expected"))?,
    };

    idx = skip_spaces(bytes, next);
    if bytes.get(idx).copied() != Some(b']') {
        return Err(invalid(source, "attribute selector must end with `]`"));
    }

    Ok((
        AttributeSelector {
            name: name.to_ascii_lowercase(),
            matcher: Some((operator, value.to_owned())),
        },
        idx.saturating_add(1),
    ))
}

fn read_ident(input: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = input.as_bytes();
    let mut idx = start;
    while idx < bytes.len() && is_ident_byte(bytes[idx]) {
        idx = idx.saturating_add(1);
    }

    if idx == start {
        return None;
    }
    Some((&input[start..idx], idx))
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || byte >= 0x80
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn invalid(source: &str, detail: &str) -> QfError {
    QfError::new(
        "css.selector.invalid",
        format!("invalid selector `{source}`: {detail}"),
    )
}

fn normalize_ws(input: &str) -> String {
    input
        .split_whitespace()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_top_level(input: &str, delimiter: char) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut idx = 0_usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut paren_depth = 0_u32;
    let mut bracket_depth = 0_u32;

    while idx < bytes.len() {
        let byte = bytes[idx];

        if in_single {
            if !escape && byte == b'\\' {
                escape = true;
            } else if !escape && byte == b'\'' {
                in_single = false;
            } else {
                escape = false;
            }
            idx = idx.saturating_add(1);
            continue;
        }

        if in_double {
            if !escape && byte == b'\\' {
                escape = true;
            } else if !escape && byte == b'"' {
                in_double = false;
            } else {
                escape = false;
            }
            idx = idx.saturating_add(1);
            continue;
        }

        match byte {
            b'\'' => in_single = true,
            b'"' => in_double = true,
            b'(' => paren_depth = paren_depth.saturating_add(1),
            b')' => paren_depth = paren_depth.saturating_sub(1),
            b'[' => bracket_depth = bracket_depth.saturating_add(1),
            b']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ => {
                if byte == delimiter as u8 && paren_depth == 0 && bracket_depth == 0 {
                    parts.push(&input[start..idx]);
                    start = idx.saturating_add(1);
                }
            }
        }

        idx = idx.saturating_add(1);
    }

    if start <= input.len() {
        parts.push(&input[start..]);
    }

    parts
}
