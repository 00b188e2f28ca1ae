//! Session-scoped tracking of suppressed, revealed and hidden-ancillary nodes.

use qf_dom::NodeId;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Visibility state of a tracked target element. Untracked means unseen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Suppressed,
    Revealed,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suppressed => "suppressed",
            Self::Revealed => "revealed",
        }
    }
}

/// Opaque handle to a tracked element, valid only within the session that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    node: NodeId,
    epoch: u64,
}

impl ItemHandle {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Bookkeeping for one tracked element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub state: ItemState,
    pub overlay: NodeId,
    /// Inline `display` the element had before it was first hidden.
    pub prior_display: Option<String>,
}

/// One map from node to state, so an element is never both suppressed and
/// revealed.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    epoch: u64,
    items: BTreeMap<NodeId, ItemRecord>,
    ancillary: BTreeSet<NodeId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Handle for a tracked element in the current session.
    pub fn handle(&self, node: NodeId) -> Option<ItemHandle> {
        self.items.contains_key(&node).then_some(ItemHandle {
            node,
            epoch: self.epoch,
        })
    }

    /// Node behind `handle`, or `None` once the session has been reset.
    pub fn resolve(&self, handle: ItemHandle) -> Option<NodeId> {
        (handle.epoch == self.epoch && self.items.contains_key(&handle.node)).then_some(handle.node)
    }

    pub fn state(&self, node: NodeId) -> Option<ItemState> {
        self.items.get(&node).map(|record| record.state)
    }

    pub fn record(&self, node: NodeId) -> Option<&ItemRecord> {
        self.items.get(&node)
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.items.contains_key(&node)
    }

    /// Starts tracking `node` as suppressed. Returns false if it was already
    /// tracked, in which case nothing changes.
    pub fn insert_suppressed(
        &mut self,
        node: NodeId,
        overlay: NodeId,
        prior_display: Option<String>,
    ) -> bool {
        if self.items.contains_key(&node) {
            return false;
        }
        self.items.insert(
            node,
            ItemRecord {
                state: ItemState::Suppressed,
                overlay,
                prior_display,
            },
        );
        true
    }

    pub fn set_state(&mut self, node: NodeId, state: ItemState) -> bool {
        match self.items.get_mut(&node) {
            Some(record) => {
                record.state = state;
                true
            }
            None => false,
        }
    }

    pub fn suppressed(&self) -> Vec<NodeId> {
        self.nodes_in(ItemState::Suppressed)
    }

    pub fn revealed(&self) -> Vec<NodeId> {
        self.nodes_in(ItemState::Revealed)
    }

    pub fn tracked_count(&self) -> usize {
        self.items.len()
    }

    /// Records an ancillary node as hidden. Returns true the first time.
    pub fn mark_ancillary(&mut self, node: NodeId) -> bool {
        self.ancillary.insert(node)
    }

    pub fn is_ancillary_hidden(&self, node: NodeId) -> bool {
        self.ancillary.contains(&node)
    }

    pub fn ancillary_count(&self) -> usize {
        self.ancillary.len()
    }

    /// Forgets all item states and invalidates outstanding handles.
    pub fn reset_items(&mut self) {
        self.items.clear();
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn reset_ancillary(&mut self) {
        self.ancillary.clear();
    }

    pub fn reset(&mut self) {
        self.reset_items();
        self.reset_ancillary();
    }

    fn nodes_in(&self, state: ItemState) -> Vec<NodeId> {
        self.items
            .iter()
            .filter(|(_, record)| record.state == state)
            .map(|(node, _)| *node)
            .collect()
    }
}
