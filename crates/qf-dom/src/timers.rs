//! Virtual-clock timer queue (`setTimeout`/`clearTimeout`).

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Timers ordered by deadline, then by scheduling order.
///
/// Time only moves when the owner advances it, which keeps event-loop tests
/// deterministic.
#[derive(Debug)]
pub struct TimerQueue<T> {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, TimerId), T>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = TimerId(self.next_id);
        let deadline = self.now.saturating_add(delay);
        self.pending.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancels a pending timer. Returns the task if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id)?;
        self.pending.remove(&(deadline, id))
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Moves the clock to the earliest deadline not after `limit` and returns
    /// every task due at that instant, in scheduling order. Returns `None`
    /// when nothing is due by `limit`.
    pub fn advance_to_next(&mut self, limit: Duration) -> Option<Vec<T>> {
        let deadline = self.next_deadline().filter(|deadline| *deadline <= limit)?;
        self.now = self.now.max(deadline);

        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > self.now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            self.deadlines.remove(&id);
            due.push(task);
        }
        Some(due)
    }

    /// Moves the clock forward without firing anything.
    pub fn settle_at(&mut self, instant: Duration) {
        self.now = self.now.max(instant);
    }
}

#[cfg(test)]
mod tests {
    use super::TimerQueue;
    use std::time::Duration;

    #[test]
    fn fires_in_deadline_order_and_groups_same_instant() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_millis(300), "settle");
        timers.schedule(Duration::from_millis(150), "debounce");
        timers.schedule(Duration::from_millis(150), "second");

        let limit = Duration::from_secs(1);
        assert_eq!(timers.advance_to_next(limit), Some(vec!["debounce", "second"]));
        assert_eq!(timers.now(), Duration::from_millis(150));
        assert_eq!(timers.advance_to_next(limit), Some(vec!["settle"]));
        assert_eq!(timers.advance_to_next(limit), None);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(Duration::from_millis(10), 1_u8);
        assert!(timers.is_pending(id));
        assert_eq!(timers.cancel(id), Some(1));
        assert_eq!(timers.cancel(id), None);
        assert_eq!(timers.advance_to_next(Duration::from_secs(1)), None);
    }

    #[test]
    fn limit_bounds_the_clock() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_millis(500), ());
        assert_eq!(timers.advance_to_next(Duration::from_millis(100)), None);
        timers.settle_at(Duration::from_millis(100));
        assert_eq!(timers.now(), Duration::from_millis(100));
        assert_eq!(timers.pending_count(), 1);
    }
}
