//! Pass-triggering timers.

use qf_dom::TimerId;
use qf_dom::TimerQueue;
use std::time::Duration;

/// What caused a processing pass to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
    Start,
    Mutation,
    Navigation,
}

impl PassTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Mutation => "mutation",
            Self::Navigation => "navigation",
        }
    }
}

/// A single pending timer. Arming again cancels whatever is still pending,
/// so at most one task from this slot is ever queued.
#[derive(Debug, Default)]
pub struct DebounceSlot {
    pending: Option<TimerId>,
}

impl DebounceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<T>(&mut self, timers: &mut TimerQueue<T>, delay: Duration, task: T) -> TimerId {
        self.cancel(timers);
        let id = timers.schedule(delay, task);
        self.pending = Some(id);
        id
    }

    /// Returns true if a pending timer was cancelled.
    pub fn cancel<T>(&mut self, timers: &mut TimerQueue<T>) -> bool {
        self.pending
            .take()
            .and_then(|id| timers.cancel(id))
            .is_some()
    }

    pub fn is_armed<T>(&self, timers: &TimerQueue<T>) -> bool {
        self.pending.is_some_and(|id| timers.is_pending(id))
    }
}
