//! Target-content detection.

use crate::ownership::is_inside_owned;
use qf_core::QfError;
use qf_css::SelectorList;
use qf_dom::Document;
use qf_dom::NodeId;
use qf_policy::BlockingPolicy;
use std::collections::HashSet;
use tracing::debug;

/// Ordered selector list applied to the whole document.
///
/// Selectors that fail to parse are dropped when the matcher is built and
/// never abort a scan.
#[derive(Debug, Clone)]
pub struct Matcher {
    compiled: Vec<SelectorList>,
    rejected: Vec<QfError>,
}

impl Matcher {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        let mut rejected = Vec::new();
        for selector in selectors {
            match SelectorList::parse(selector.as_ref()) {
                Ok(list) => compiled.push(list),
                Err(error) => {
                    debug!(selector = selector.as_ref(), %error, "skipping selector");
                    rejected.push(error);
                }
            }
        }
        Self { compiled, rejected }
    }

    pub fn targets(policy: &BlockingPolicy) -> Self {
        Self::new(policy.target_selectors())
    }

    pub fn ancillary(policy: &BlockingPolicy) -> Self {
        Self::new(policy.ancillary_selectors())
    }

    pub fn selector_count(&self) -> usize {
        self.compiled.len()
    }

    pub fn rejected(&self) -> &[QfError] {
        &self.rejected
    }

    /// Unique matches in selector-list order, document order within each
    /// selector. Nodes inside pipeline-owned subtrees are never reported.
    pub fn find(&self, document: &Document) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for list in &self.compiled {
            for node in list.query_all(document) {
                if is_inside_owned(document, node) || !seen.insert(node) {
                    continue;
                }
                found.push(node);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::Matcher;
    use crate::ownership::mark_owned;
    use qf_dom::Document;

    fn shelf(document: &mut Document, tag: &str, shorts: bool) -> qf_dom::NodeId {
        let body = document.body();
        let node = document.create_element(tag);
        if shorts {
            assert!(document.set_attribute(node, "is-shorts", "").is_ok());
        }
        assert!(document.append_child(body, node).is_ok());
        node
    }

    #[test]
    fn deduplicates_in_first_seen_order() {
        let mut document = Document::new();
        let rich = shelf(&mut document, "ytd-rich-shelf-renderer", true);
        let reel = shelf(&mut document, "ytd-reel-shelf-renderer", false);
        let plain = shelf(&mut document, "ytd-rich-shelf-renderer", false);

        let matcher = Matcher::new([
            "ytd-reel-shelf-renderer",
            "ytd-rich-shelf-renderer[is-shorts]",
            "[is-shorts]",
        ]);
        assert_eq!(matcher.find(&document), vec![reel, rich]);
        assert!(!matcher.find(&document).contains(&plain));
    }

    #[test]
    fn bad_selectors_are_skipped() {
        let mut document = Document::new();
        let reel = shelf(&mut document, "ytd-reel-shelf-renderer", false);

        let matcher = Matcher::new(["div:has(> a)", "", "ytd-reel-shelf-renderer"]);
        assert_eq!(matcher.selector_count(), 1);
        assert_eq!(matcher.rejected().len(), 2);
        assert_eq!(matcher.find(&document), vec![reel]);
    }

    #[test]
    fn owned_subtrees_are_invisible() {
        let mut document = Document::new();
        let overlay = shelf(&mut document, "div", false);
        assert!(mark_owned(&mut document, overlay).is_ok());
        let inner = document.create_element("ytd-reel-shelf-renderer");
        assert!(document.append_child(overlay, inner).is_ok());

        let matcher = Matcher::new(["ytd-reel-shelf-renderer"]);
        assert!(matcher.find(&document).is_empty());
    }

    #[test]
    fn repeated_scans_are_identical() {
        let mut document = Document::new();
        shelf(&mut document, "ytd-reel-shelf-renderer", false);
        shelf(&mut document, "ytd-reel-shelf-renderer", false);

        let matcher = Matcher::new(["ytd-reel-shelf-renderer"]);
        let first = matcher.find(&document);
        assert_eq!(first.len(), 2);
        assert_eq!(matcher.find(&document), first);
    }
}
