//! Input events and document-level listeners.

use crate::document::NodeId;
use std::fmt;

/// Input event types the host dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Wheel,
    TouchMove,
    KeyDown,
    Click,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wheel => "wheel",
            Self::TouchMove => "touchmove",
            Self::KeyDown => "keydown",
            Self::Click => "click",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "wheel" => Some(Self::Wheel),
            "touchmove" => Some(Self::TouchMove),
            "keydown" => Some(Self::KeyDown),
            "click" => Some(Self::Click),
            _ => None,
        }
    }
}

/// A dispatched input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub key: Option<String>,
    pub target: Option<NodeId>,
    default_prevented: bool,
    propagation_stopped: bool,
    in_passive_listener: bool,
}

impl InputEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            key: None,
            target: None,
            default_prevented: false,
            propagation_stopped: false,
            in_passive_listener: false,
        }
    }

    pub fn wheel() -> Self {
        Self::new(EventKind::Wheel)
    }

    pub fn touch_move() -> Self {
        Self::new(EventKind::TouchMove)
    }

    pub fn key_down(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(EventKind::KeyDown)
        }
    }

    pub fn click(target: NodeId) -> Self {
        Self {
            target: Some(target),
            ..Self::new(EventKind::Click)
        }
    }

    /// Cancels the default action. Ignored inside passive listeners.
    pub fn prevent_default(&mut self) {
        if !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// `addEventListener` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
}

impl ListenerOptions {
    /// Capture phase, allowed to cancel the default action.
    pub fn blocking_capture() -> Self {
        Self {
            capture: true,
            passive: false,
        }
    }
}

pub type EventCallback = Box<dyn Fn(&mut InputEvent)>;

struct ListenerEntry {
    id: ListenerId,
    kind: EventKind,
    options: ListenerOptions,
    callback: EventCallback,
}

/// Listeners attached at document level.
///
/// Capture listeners run before page (bubble) listeners. Once a capture
/// listener stops propagation, page listeners are skipped; listeners of the
/// same phase still run.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerRegistry {
    pub fn add(
        &mut self,
        kind: EventKind,
        options: ListenerOptions,
        callback: EventCallback,
    ) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ListenerId(self.next_id);
        self.entries.push(ListenerEntry {
            id,
            kind,
            options,
            callback,
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn dispatch(&self, event: &mut InputEvent) {
        for capture_phase in [true, false] {
            if !capture_phase && event.propagation_stopped {
                break;
            }

            for entry in &self.entries {
                if entry.kind != event.kind || entry.options.capture != capture_phase {
                    continue;
                }
                event.in_passive_listener = entry.options.passive;
                (entry.callback)(event);
                event.in_passive_listener = false;
            }
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::EventKind;
    use super::InputEvent;
    use super::ListenerOptions;
    use super::ListenerRegistry;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn capture_listener_stopping_propagation_skips_page_handlers() {
        let mut registry = ListenerRegistry::default();
        let page_calls = Rc::new(Cell::new(0_u32));
        let seen = Rc::clone(&page_calls);
        registry.add(
            EventKind::Wheel,
            ListenerOptions::default(),
            Box::new(move |_| seen.set(seen.get() + 1)),
        );
        registry.add(
            EventKind::Wheel,
            ListenerOptions::blocking_capture(),
            Box::new(|event| {
                event.prevent_default();
                event.stop_propagation();
            }),
        );

        let mut event = InputEvent::wheel();
        registry.dispatch(&mut event);
        assert!(event.is_default_prevented());
        assert!(event.is_propagation_stopped());
        assert_eq!(page_calls.get(), 0);
    }

    #[test]
    fn passive_listeners_cannot_cancel_default_action() {
        let mut registry = ListenerRegistry::default();
        registry.add(
            EventKind::TouchMove,
            ListenerOptions {
                capture: true,
                passive: true,
            },
            Box::new(|event| event.prevent_default()),
        );

        let mut event = InputEvent::touch_move();
        registry.dispatch(&mut event);
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn removing_a_listener_is_reported_once() {
        let mut registry = ListenerRegistry::default();
        let id = registry.add(
            EventKind::KeyDown,
            ListenerOptions::default(),
            Box::new(|_| {}),
        );
        assert_eq!(registry.count(EventKind::KeyDown), 1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.total(), 0);
    }

    #[test]
    fn event_kind_names_roundtrip() {
        for kind in [
            EventKind::Wheel,
            EventKind::TouchMove,
            EventKind::KeyDown,
            EventKind::Click,
        ] {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("scroll"), None);
    }
}
