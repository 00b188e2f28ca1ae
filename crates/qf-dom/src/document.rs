//! DOM tree data structures.

use crate::events::EventCallback;
use crate::events::EventKind;
use crate::events::InputEvent;
use crate::events::ListenerId;
use crate::events::ListenerOptions;
use crate::events::ListenerRegistry;
use crate::style::InlineStyle;
use qf_core::QfError;
use qf_core::QfResult;
use std::fmt;

/// ID used to address nodes in the DOM arena. IDs are never reused, so a
/// handle to a removed node stays distinct from every later node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Parses the decimal form written into `data-*` attributes.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<usize>().ok().map(Self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element or text payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

/// Element payload. The `style` attribute is kept parsed in `style`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    attributes: Vec<(String, String)>,
    style: InlineStyle,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// One child-list change observed inside the watched subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Live document: `<html>` with `<head>` and `<body>`, plus document-level
/// input listeners and a single child-list observer.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    observed: Option<NodeId>,
    pending: Vec<MutationRecord>,
    listeners: ListenerRegistry,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            observed: None,
            pending: Vec::new(),
            listeners: ListenerRegistry::default(),
        };

        let root = document.create_element("html");
        let head = document.create_element("head");
        let body = document.create_element("body");
        document.link(root, head, None);
        document.link(root, body, None);
        document.root = root;
        document.head = head;
        document.body = body;
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            tag: tag.trim().to_ascii_lowercase(),
            attributes: Vec::new(),
            style: InlineStyle::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_owned()))
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node.0).map(|entry| &entry.kind)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Element(_)))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|entry| entry.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|child| *child == node)?;
        siblings.get(index.saturating_add(1)).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|child| *child == node)?;
        index.checked_sub(1).and_then(|prev| siblings.get(prev).copied())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.parent(current);
        }
        out
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains_node(node) && self.is_inclusive_ancestor(self.root, node)
    }

    /// Descendants of `node` in document (pre-)order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Connected elements in document order, starting with `<html>`.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(
            self.descendants(self.root)
                .into_iter()
                .filter(|node| self.is_element(*node)),
        );
        out
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        let element = self.element(node)?;
        let name = name.to_ascii_lowercase();
        element
            .attributes
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        self.element(node)
            .map(|element| element.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// Sets an attribute. `style` replaces the parsed inline style.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> QfResult<()> {
        let element = self.element_mut(node)?;
        let name = name.trim().to_ascii_lowercase();
        if name == "style" {
            element.style = InlineStyle::parse(value);
            return Ok(());
        }

        if let Some(slot) = element.attributes.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value.to_owned();
        } else {
            element.attributes.push((name, value.to_owned()));
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> QfResult<Option<String>> {
        let element = self.element_mut(node)?;
        let name = name.to_ascii_lowercase();
        let Some(index) = element.attributes.iter().position(|(key, _)| *key == name) else {
            return Ok(None);
        };
        Ok(Some(element.attributes.remove(index).1))
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|entry| entry == class))
    }

    pub fn style(&self, node: NodeId) -> Option<&InlineStyle> {
        self.element(node).map(|element| &element.style)
    }

    pub fn style_property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.style(node).and_then(|style| style.get(name))
    }

    pub fn set_style_property(&mut self, node: NodeId, name: &str, value: &str) -> QfResult<()> {
        self.element_mut(node)?.style.set(name, value);
        Ok(())
    }

    pub fn remove_style_property(&mut self, node: NodeId, name: &str) -> QfResult<Option<String>> {
        Ok(self.element_mut(node)?.style.remove(name))
    }

    /// True when the node or an ancestor carries inline `display: none`.
    pub fn is_hidden(&self, node: NodeId) -> bool {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .any(|current| self.style_property(current, "display") == Some("none"))
    }

    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(NodeKind::Text(text)) = self.kind(node) {
            return text.clone();
        }

        self.descendants(node)
            .into_iter()
            .filter_map(|current| match self.kind(current) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> QfResult<()> {
        self.element(node).ok_or_else(|| not_an_element(node))?;
        let removed = std::mem::take(&mut self.node_mut(node)?.children);
        for child in &removed {
            if let Some(entry) = self.nodes.get_mut(child.0) {
                entry.parent = None;
            }
        }

        let text_node = self.create_text(text);
        self.link(node, text_node, None);
        self.record(node, vec![text_node], removed);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> QfResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` into `parent` before `reference` (or last when `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> QfResult<()> {
        self.validate_insertion(parent, child)?;
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(QfError::new(
                    "dom.reference_not_child",
                    format!("node {reference} is not a child of node {parent}"),
                ));
            }
        }

        self.detach(child);
        self.link(parent, child, reference);
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Inserts `child` immediately after `reference` in its parent.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> QfResult<()> {
        let parent = self.parent(reference).ok_or_else(|| {
            QfError::new(
                "dom.insert_after.no_parent",
                format!("node {reference} has no parent to insert into"),
            )
        })?;

        if reference == child {
            return Ok(());
        }

        self.validate_insertion(parent, child)?;
        self.detach(child);
        let next = self.next_sibling(reference);
        self.link(parent, child, next);
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Detaches `node` from its parent. Returns false if it had none.
    pub fn remove(&mut self, node: NodeId) -> bool {
        match self.detach(node) {
            Some(parent) => {
                self.record(parent, Vec::new(), vec![node]);
                true
            }
            None => false,
        }
    }

    /// Starts recording child-list mutations inside `subtree`, replacing any
    /// previous observation target.
    pub fn observe(&mut self, subtree: NodeId) {
        self.observed = Some(subtree);
        self.pending.clear();
    }

    pub fn disconnect_observer(&mut self) {
        self.observed = None;
        self.pending.clear();
    }

    pub fn is_observed(&self) -> bool {
        self.observed.is_some()
    }

    /// Drains the records gathered since the previous call.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    pub fn add_event_listener(
        &mut self,
        kind: EventKind,
        options: ListenerOptions,
        callback: EventCallback,
    ) -> ListenerId {
        self.listeners.add(kind, options, callback)
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.count(kind)
    }

    /// Runs document-level listeners and returns the settled event.
    pub fn dispatch_event(&self, mut event: InputEvent) -> InputEvent {
        self.listeners.dispatch(&mut event);
        event
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match self.kind(node) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> QfResult<&mut ElementData> {
        match self.nodes.get_mut(node.0).map(|entry| &mut entry.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(NodeKind::Text(_)) => Err(not_an_element(node)),
            None => Err(missing_node(node)),
        }
    }

    fn node_mut(&mut self, node: NodeId) -> QfResult<&mut Node> {
        self.nodes.get_mut(node.0).ok_or_else(|| missing_node(node))
    }

    fn validate_insertion(&self, parent: NodeId, child: NodeId) -> QfResult<()> {
        if !self.contains_node(child) {
            return Err(missing_node(child));
        }
        if !self.is_element(parent) {
            return Err(not_an_element(parent));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(QfError::new(
                "dom.hierarchy_invalid",
                format!("node {child} cannot be inserted into its own subtree"),
            ));
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        if let Some(entry) = self.nodes.get_mut(parent.0) {
            entry.children.retain(|child| *child != node);
        }
        if let Some(entry) = self.nodes.get_mut(node.0) {
            entry.parent = None;
        }
        Some(parent)
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let Some(entry) = self.nodes.get_mut(parent.0) else {
            return;
        };
        let index = before
            .and_then(|reference| entry.children.iter().position(|node| *node == reference))
            .unwrap_or(entry.children.len());
        entry.children.insert(index, child);
        if let Some(child_entry) = self.nodes.get_mut(child.0) {
            child_entry.parent = Some(parent);
        }
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        let Some(observed) = self.observed else {
            return;
        };
        if added.is_empty() && removed.is_empty() {
            return;
        }
        if self.is_inclusive_ancestor(observed, target) {
            self.pending.push(MutationRecord {
                target,
                added,
                removed,
            });
        }
    }
}

fn missing_node(node: NodeId) -> QfError {
    QfError::new("dom.node_missing", format!("node {node} does not exist"))
}

fn not_an_element(node: NodeId) -> QfError {
    QfError::new("dom.not_an_element", format!("node {node} is not an element"))
}

#[cfg(test)]
mod tests {
    use super::Document;
    use super::MutationRecord;
    use super::NodeId;

    #[test]
    fn new_document_has_html_head_and_body() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.root()), Some("html"));
        assert_eq!(doc.children(doc.root()), &[doc.head(), doc.body()]);
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn insert_after_places_node_as_next_sibling() {
        let mut doc = Document::new();
        let first = doc.create_element("div");
        let last = doc.create_element("div");
        let middle = doc.create_element("span");
        assert!(doc.append_child(doc.body(), first).is_ok());
        assert!(doc.append_child(doc.body(), last).is_ok());
        assert!(doc.insert_after(first, middle).is_ok());
        assert_eq!(doc.children(doc.body()), &[first, middle, last]);
        assert_eq!(doc.next_sibling(first), Some(middle));
        assert_eq!(doc.previous_sibling(last), Some(middle));
    }

    #[test]
    fn insert_after_detached_node_reports_missing_parent() {
        let mut doc = Document::new();
        let orphan = doc.create_element("div");
        let overlay = doc.create_element("div");
        let result = doc.insert_after(orphan, overlay);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "dom.insert_after.no_parent");
        }
    }

    #[test]
    fn rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        assert!(doc.append_child(doc.body(), outer).is_ok());
        assert!(doc.append_child(outer, inner).is_ok());
        let result = doc.append_child(inner, outer);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "dom.hierarchy_invalid");
        }
    }

    #[test]
    fn observer_records_child_list_changes_inside_subtree_only() {
        let mut doc = Document::new();
        doc.observe(doc.body());

        let card = doc.create_element("div");
        let meta = doc.create_element("meta");
        assert!(doc.append_child(doc.body(), card).is_ok());
        assert!(doc.append_child(doc.head(), meta).is_ok());
        assert!(doc.set_attribute(card, "class", "card").is_ok());
        assert!(doc.remove(card));

        assert_eq!(
            doc.take_mutations(),
            vec![
                MutationRecord {
                    target: doc.body(),
                    added: vec![card],
                    removed: Vec::new(),
                },
                MutationRecord {
                    target: doc.body(),
                    added: Vec::new(),
                    removed: vec![card],
                },
            ]
        );
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn style_attribute_is_parsed_into_inline_style() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        assert!(doc.set_attribute(node, "style", "display: none; color: red").is_ok());
        assert_eq!(doc.style_property(node, "display"), Some("none"));
        assert!(doc.attribute(node, "style").is_none());
        assert!(doc.append_child(doc.body(), node).is_ok());
        let child = doc.create_element("span");
        assert!(doc.append_child(node, child).is_ok());
        assert!(doc.is_hidden(child));
    }

    #[test]
    fn text_content_concatenates_descendant_text() {
        let mut doc = Document::new();
        let para = doc.create_element("p");
        let bold = doc.create_element("b");
        let hello = doc.create_text("Hello ");
        let world = doc.create_text("world");
        assert!(doc.append_child(para, hello).is_ok());
        assert!(doc.append_child(para, bold).is_ok());
        assert!(doc.append_child(bold, world).is_ok());
        assert_eq!(doc.text_content(para), "Hello world");

        assert!(doc.set_text_content(para, "Bye").is_ok());
        assert_eq!(doc.text_content(para), "Bye");
        assert_eq!(doc.parent(bold), None);
    }

    #[test]
    fn node_ids_parse_from_attribute_form() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        assert_eq!(NodeId::parse(&node.to_string()), Some(node));
        assert_eq!(NodeId::parse("not-a-node"), None);
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        assert!(doc.set_attribute(node, "Data-Quietfeed", "").is_ok());
        assert!(doc.has_attribute(node, "data-quietfeed"));

        let removed = doc.remove_attribute(node, "DATA-QUIETFEED");
        assert_eq!(removed, Ok(Some(String::new())));
        assert!(!doc.has_attribute(node, "data-quietfeed"));
        assert_eq!(doc.remove_attribute(node, "data-quietfeed"), Ok(None));
    }
}
