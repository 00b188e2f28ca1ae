//! Child-list observation with self-inflicted changes filtered out.

use crate::ownership::is_inside_owned;
use crate::timer::DebounceSlot;
use crate::timer::PassTrigger;
use qf_dom::Document;
use qf_dom::MutationRecord;
use qf_dom::TimerQueue;
use std::time::Duration;
use tracing::debug;

/// True if the record only reflects the pipeline's own writes: its target is
/// inside an owned subtree, or every node it added or removed is owned.
pub fn is_self_inflicted(document: &Document, record: &MutationRecord) -> bool {
    if is_inside_owned(document, record.target) {
        return true;
    }

    let mut changed = record.added.iter().chain(&record.removed).peekable();
    changed.peek().is_some() && changed.all(|node| is_inside_owned(document, *node))
}

/// Records that should trigger another pass.
pub fn qualifying_mutations(
    document: &Document,
    records: Vec<MutationRecord>,
) -> Vec<MutationRecord> {
    records
        .into_iter()
        .filter(|record| !is_self_inflicted(document, record))
        .collect()
}

/// Watches `<body>` and debounces qualifying batches into one pending pass.
#[derive(Debug)]
pub struct MutationWatcher {
    delay: Duration,
    slot: DebounceSlot,
    batches_seen: u64,
    batches_ignored: u64,
}

impl MutationWatcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: DebounceSlot::new(),
            batches_seen: 0,
            batches_ignored: 0,
        }
    }

    pub fn start(&self, document: &mut Document) {
        let body = document.body();
        document.observe(body);
    }

    pub fn stop(&mut self, document: &mut Document, timers: &mut TimerQueue<PassTrigger>) {
        document.disconnect_observer();
        self.slot.cancel(timers);
    }

    /// Drains pending records and (re)arms the debounce when any qualify.
    /// Returns true if the timer was armed.
    pub fn poll(&mut self, document: &mut Document, timers: &mut TimerQueue<PassTrigger>) -> bool {
        let records = document.take_mutations();
        if records.is_empty() {
            return false;
        }
        self.on_batch(document, timers, records)
    }

    pub fn on_batch(
        &mut self,
        document: &Document,
        timers: &mut TimerQueue<PassTrigger>,
        records: Vec<MutationRecord>,
    ) -> bool {
        self.batches_seen = self.batches_seen.saturating_add(1);
        let total = records.len();
        let qualifying = qualifying_mutations(document, records);
        if qualifying.is_empty() {
            self.batches_ignored = self.batches_ignored.saturating_add(1);
            debug!(records = total, "ignoring self-inflicted mutations");
            return false;
        }

        self.slot.arm(timers, self.delay, PassTrigger::Mutation);
        debug!(
            records = total,
            qualifying = qualifying.len(),
            delay_ms = self.delay.as_millis(),
            "mutation pass scheduled"
        );
        true
    }

    pub fn is_pending(&self, timers: &TimerQueue<PassTrigger>) -> bool {
        self.slot.is_armed(timers)
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    pub fn batches_ignored(&self) -> u64 {
        self.batches_ignored
    }
}
