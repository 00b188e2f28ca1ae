//! Marking of nodes the pipeline created itself.

use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::NodeId;
use qf_policy::OWNED_MARKER_ATTRIBUTE;

/// Stamps `node` as pipeline-owned.
pub fn mark_owned(document: &mut Document, node: NodeId) -> QfResult<()> {
    document.set_attribute(node, OWNED_MARKER_ATTRIBUTE, "")
}

pub fn is_owned(document: &Document, node: NodeId) -> bool {
    document.has_attribute(node, OWNED_MARKER_ATTRIBUTE)
}

/// True if `node` or any of its ancestors is pipeline-owned. Detached nodes
/// are judged by their own remaining ancestry.
pub fn is_inside_owned(document: &Document, node: NodeId) -> bool {
    is_owned(document, node)
        || document
            .ancestors(node)
            .into_iter()
            .any(|ancestor| is_owned(document, ancestor))
}

/// Builds an owned element with the given class and optional text.
pub(crate) fn owned_element(
    document: &mut Document,
    tag: &str,
    class: &str,
    text: Option<&str>,
) -> QfResult<NodeId> {
    let node = document.create_element(tag);
    mark_owned(document, node)?;
    document.set_attribute(node, "class", class)?;
    if let Some(text) = text {
        document.set_text_content(node, text)?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::is_inside_owned;
    use super::is_owned;
    use super::owned_element;
    use qf_dom::Document;

    #[test]
    fn ownership_extends_to_descendants() {
        let mut document = Document::new();
        let body = document.body();
        let wrapper = owned_element(&mut document, "div", "qf-overlay", None)
            .unwrap_or_else(|_| unreachable!());
        let label = owned_element(&mut document, "span", "qf-label", Some("hidden"))
            .unwrap_or_else(|_| unreachable!());
        let plain = document.create_element("b");
        assert!(document.append_child(wrapper, label).is_ok());
        assert!(document.append_child(label, plain).is_ok());
        assert!(document.append_child(body, wrapper).is_ok());

        assert!(is_owned(&document, wrapper));
        assert!(!is_owned(&document, plain));
        assert!(is_inside_owned(&document, plain));
        assert!(!is_inside_owned(&document, body));
        assert_eq!(document.text_content(label), "hidden");
    }
}
