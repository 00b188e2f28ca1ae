//! Per-element suppression with a reversible overlay.
//!
//! An element moves `unseen -> suppressed <-> revealed`. Suppression inserts
//! an overlay right after the element and hides the element through its
//! inline `display`; toggling swaps which of the two is visible. Nothing
//! outside the element's own style and its overlay is touched.

use crate::ownership::is_owned;
use crate::ownership::mark_owned;
use crate::ownership::owned_element;
use crate::registry::ItemHandle;
use crate::registry::ItemState;
use crate::registry::SessionRegistry;
use qf_core::QfError;
use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::NodeId;
use qf_policy::OVERLAY_TARGET_ATTRIBUTE;
use tracing::debug;

pub const OVERLAY_CLASS: &str = "qf-overlay";
pub const LABEL_CLASS: &str = "qf-label";
pub const TOGGLE_CLASS: &str = "qf-toggle";
pub const SAVE_CLASS: &str = "qf-save";
/// Overlay attribute remembering the element's original inline `display`.
pub const PRIOR_DISPLAY_ATTRIBUTE: &str = "data-quietfeed-display";

const OVERLAY_LABEL: &str = "Short hidden by QuietFeed";
const TOGGLE_LABEL: &str = "Show";
const SAVE_LABEL: &str = "Save";

/// Result of a `suppress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressOutcome {
    Suppressed { overlay: NodeId, reused: bool },
    /// Already suppressed or revealed in this session; nothing was written.
    AlreadyTracked,
}

#[derive(Debug, Default)]
pub struct ItemSuppressor;

impl ItemSuppressor {
    pub fn new() -> Self {
        Self
    }

    pub fn suppress(
        &self,
        document: &mut Document,
        registry: &mut SessionRegistry,
        element: NodeId,
    ) -> QfResult<SuppressOutcome> {
        if registry.is_tracked(element) {
            return Ok(SuppressOutcome::AlreadyTracked);
        }

        if document.parent(element).is_none() {
            return Err(QfError::new(
                "content.suppress.no_parent",
                format!("element {element} has no parent to hold an overlay"),
            ));
        }

        let (overlay, reused, prior_display) = match existing_overlay(document, element) {
            Some(overlay) => {
                let prior = document
                    .attribute(overlay, PRIOR_DISPLAY_ATTRIBUTE)
                    .map(str::to_owned);
                document.remove_style_property(overlay, "display")?;
                (overlay, true, prior)
            }
            None => {
                let prior = document.style_property(element, "display").map(str::to_owned);
                let overlay = build_overlay(document, element, prior.as_deref())?;
                document.insert_after(element, overlay)?;
                (overlay, false, prior)
            }
        };

        document.set_style_property(element, "display", "none")?;
        registry.insert_suppressed(element, overlay, prior_display);
        debug!(%element, %overlay, reused, "suppressed element");
        Ok(SuppressOutcome::Suppressed { overlay, reused })
    }

    /// Flips a tracked element between suppressed and revealed.
    pub fn toggle(
        &self,
        document: &mut Document,
        registry: &mut SessionRegistry,
        handle: ItemHandle,
    ) -> QfResult<ItemState> {
        let element = registry.resolve(handle).ok_or_else(|| {
            QfError::new(
                "content.toggle.stale_handle",
                format!("handle for element {} is from an earlier session", handle.node()),
            )
        })?;
        let record = registry.record(element).cloned().ok_or_else(|| {
            QfError::new(
                "content.toggle.untracked",
                format!("element {element} is not tracked"),
            )
        })?;

        let next = match record.state {
            ItemState::Suppressed => {
                restore_display(document, element, record.prior_display.as_deref())?;
                document.set_style_property(record.overlay, "display", "none")?;
                ItemState::Revealed
            }
            ItemState::Revealed => {
                document.set_style_property(element, "display", "none")?;
                document.remove_style_property(record.overlay, "display")?;
                ItemState::Suppressed
            }
        };

        registry.set_state(element, next);
        debug!(%element, state = next.as_str(), "toggled element");
        Ok(next)
    }

    /// Forgets every item state; the DOM is left as it is.
    pub fn reset(&self, registry: &mut SessionRegistry) {
        registry.reset_items();
    }
}

/// Element an overlay stands in for, read from its target attribute.
pub fn overlay_target(document: &Document, overlay: NodeId) -> Option<NodeId> {
    if !is_owned(document, overlay) {
        return None;
    }
    document
        .attribute(overlay, OVERLAY_TARGET_ATTRIBUTE)
        .and_then(NodeId::parse)
}

/// An overlay left behind by an earlier session, still right after `element`.
fn existing_overlay(document: &Document, element: NodeId) -> Option<NodeId> {
    document
        .next_sibling(element)
        .filter(|sibling| overlay_target(document, *sibling) == Some(element))
}

fn build_overlay(
    document: &mut Document,
    element: NodeId,
    prior_display: Option<&str>,
) -> QfResult<NodeId> {
    let overlay = document.create_element("div");
    mark_owned(document, overlay)?;
    document.set_attribute(overlay, "class", OVERLAY_CLASS)?;
    document.set_attribute(overlay, OVERLAY_TARGET_ATTRIBUTE, &element.to_string())?;
    if let Some(display) = prior_display {
        document.set_attribute(overlay, PRIOR_DISPLAY_ATTRIBUTE, display)?;
    }

    let label = owned_element(document, "span", LABEL_CLASS, Some(OVERLAY_LABEL))?;
    let toggle = owned_element(document, "button", TOGGLE_CLASS, Some(TOGGLE_LABEL))?;
    let save = owned_element(document, "button", SAVE_CLASS, Some(SAVE_LABEL))?;
    for child in [label, toggle, save] {
        document.append_child(overlay, child)?;
    }
    Ok(overlay)
}

fn restore_display(document: &mut Document, element: NodeId, prior: Option<&str>) -> QfResult<()> {
    match prior {
        Some(display) => document.set_style_property(element, "display", display),
        None => document.remove_style_property(element, "display").map(|_| ()),
    }
}
