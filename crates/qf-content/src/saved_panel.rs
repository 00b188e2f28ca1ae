//! Saved-items panel injected on the landing page.

use crate::ownership::is_inside_owned;
use crate::ownership::owned_element;
use qf_core::QfResult;
use qf_css::query_selector;
use qf_dom::Document;
use qf_dom::NodeId;
use qf_policy::BlockingPolicy;
use qf_storage::SavedItem;
use tracing::debug;

pub const PANEL_CLASS: &str = "qf-saved-panel";
const PANEL_TITLE: &str = "Saved shorts";
const EMPTY_MESSAGE: &str = "No saved shorts yet.";

#[derive(Debug, Clone)]
pub struct SavedItemsPanel {
    container_selector: String,
    panel: Option<NodeId>,
    shown: Vec<SavedItem>,
}

impl SavedItemsPanel {
    pub fn new(container_selector: impl Into<String>) -> Self {
        Self {
            container_selector: container_selector.into(),
            panel: None,
            shown: Vec::new(),
        }
    }

    pub fn from_policy(policy: &BlockingPolicy) -> Self {
        Self::new(policy.config.selectors.panel_container.clone())
    }

    pub fn panel(&self) -> Option<NodeId> {
        self.panel
    }

    /// Replaces any existing panel with one listing `items`. A panel that
    /// already lists `items` in the right container is kept as is.
    pub fn refresh(&mut self, document: &mut Document, items: &[SavedItem]) -> QfResult<NodeId> {
        let container = self.container(document);
        let current = self
            .panel
            .filter(|panel| document.parent(*panel) == Some(container) && self.shown == items);
        if let Some(panel) = current {
            debug!(%panel, "saved-items panel unchanged");
            return Ok(panel);
        }
        self.remove(document);

        let panel = build_panel(document, items)?;
        let first = document.children(container).first().copied();
        document.insert_before(container, panel, first)?;
        self.panel = Some(panel);
        self.shown = items.to_vec();
        debug!(items = items.len(), %container, "saved-items panel refreshed");
        Ok(panel)
    }

    /// Detaches the panel. Returns false if none was shown.
    pub fn remove(&mut self, document: &mut Document) -> bool {
        self.shown.clear();
        match self.panel.take() {
            Some(panel) => document.remove(panel),
            None => false,
        }
    }

    fn container(&self, document: &Document) -> NodeId {
        query_selector(document, &self.container_selector)
            .ok()
            .flatten()
            .filter(|node| !is_inside_owned(document, *node))
            .unwrap_or_else(|| document.body())
    }
}

fn build_panel(document: &mut Document, items: &[SavedItem]) -> QfResult<NodeId> {
    let panel = owned_element(document, "section", PANEL_CLASS, None)?;
    let title = owned_element(document, "h2", "qf-saved-title", Some(PANEL_TITLE))?;
    document.append_child(panel, title)?;

    if items.is_empty() {
        let empty = owned_element(document, "p", "qf-saved-empty", Some(EMPTY_MESSAGE))?;
        document.append_child(panel, empty)?;
        return Ok(panel);
    }

    let list = owned_element(document, "ul", "qf-saved-list", None)?;
    for item in items {
        let entry = owned_element(document, "li", "qf-saved-item", None)?;
        let link = owned_element(document, "a", "qf-saved-link", Some(&item.title))?;
        document.set_attribute(link, "href", &item.url)?;
        document.set_attribute(link, "data-quietfeed-id", &item.id)?;
        document.append_child(entry, link)?;
        document.append_child(list, entry)?;
    }
    document.append_child(panel, list)?;
    Ok(panel)
}
