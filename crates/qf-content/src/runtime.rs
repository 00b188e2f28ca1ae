//! Single-threaded event loop of the content script.
//!
//! The runtime owns the document, its history and a virtual clock. Host
//! signals (mutations, navigations, clicks) are picked up by `pump`, and
//! passes run when `advance` moves the clock past a pending timer. Timers
//! falling due at the same instant collapse into one pass.

use crate::controller::ClickOutcome;
use crate::controller::PageController;
use crate::controller::PassReport;
use crate::mutation_watcher::MutationWatcher;
use crate::navigation::NavigationWatcher;
use crate::suppressor::SAVE_CLASS;
use crate::suppressor::TOGGLE_CLASS;
use crate::timer::DebounceSlot;
use crate::timer::PassTrigger;
use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::History;
use qf_dom::InputEvent;
use qf_dom::NavigationEvent;
use qf_dom::NodeId;
use qf_dom::TimerQueue;
use qf_ipc::ExtensionBridge;
use qf_policy::BlockingPolicy;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Debug)]
pub struct ContentScript<B> {
    document: Document,
    history: History,
    timers: TimerQueue<PassTrigger>,
    controller: PageController<B>,
    mutations: MutationWatcher,
    navigation: NavigationWatcher,
    settle: DebounceSlot,
    settle_delay: Duration,
    reports: Vec<PassReport>,
    started: bool,
}

impl<B: ExtensionBridge> ContentScript<B> {
    pub fn new(document: Document, mut history: History, policy: BlockingPolicy, bridge: B) -> Self {
        let navigation = NavigationWatcher::attach(&mut history);
        let timing = policy.config.timing.clone();
        let controller = PageController::new(policy, bridge, history.location());

        Self {
            document,
            history,
            timers: TimerQueue::new(),
            controller,
            mutations: MutationWatcher::new(timing.mutation_debounce()),
            navigation,
            settle: DebounceSlot::new(),
            settle_delay: timing.navigation_settle(),
            reports: Vec::new(),
            started: false,
        }
    }

    /// Starts observing and runs the first pass immediately.
    pub fn start(&mut self) -> Option<PassReport> {
        if self.started {
            return None;
        }
        self.started = true;
        self.mutations.start(&mut self.document);
        info!(location = %self.history.location(), "content script started");

        let report = self.run_pass(PassTrigger::Start);
        self.pump();
        report
    }

    /// Stops observing, drops pending passes and undoes page-wide effects.
    pub fn stop(&mut self) -> QfResult<()> {
        self.started = false;
        self.mutations.stop(&mut self.document, &mut self.timers);
        self.settle.cancel(&mut self.timers);
        self.controller.shutdown(&mut self.document)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Delivers queued navigation signals and mutation records.
    pub fn pump(&mut self) {
        for event in self.navigation.drain() {
            self.on_navigation(&event);
        }
        if self.started {
            self.mutations.poll(&mut self.document, &mut self.timers);
        }
    }

    /// Moves the clock forward by `by`, running every pass that falls due.
    pub fn advance(&mut self, by: Duration) -> Vec<PassReport> {
        let limit = self.timers.now().saturating_add(by);
        let mut reports = Vec::new();
        loop {
            self.pump();
            let Some(triggers) = self.timers.advance_to_next(limit) else {
                break;
            };
            let Some(trigger) = triggers.last().copied() else {
                continue;
            };
            if triggers.len() > 1 {
                debug!(collapsed = triggers.len(), "simultaneous triggers run as one pass");
            }
            if let Some(report) = self.run_pass(trigger) {
                reports.push(report);
            }
        }
        self.timers.settle_at(limit);
        reports
    }

    /// Advances until no pass is pending.
    pub fn run_until_idle(&mut self) -> Vec<PassReport> {
        let mut reports = Vec::new();
        loop {
            self.pump();
            let Some(deadline) = self.timers.next_deadline() else {
                break;
            };
            let wait = deadline.saturating_sub(self.timers.now());
            reports.extend(self.advance(wait));
        }
        reports
    }

    pub fn push_state(&mut self, url: &str) -> QfResult<()> {
        self.history.push_state(url)?;
        self.pump();
        Ok(())
    }

    pub fn replace_state(&mut self, url: &str) -> QfResult<()> {
        self.history.replace_state(url)?;
        self.pump();
        Ok(())
    }

    pub fn back(&mut self) -> bool {
        let moved = self.history.back();
        self.pump();
        moved
    }

    pub fn forward(&mut self) -> bool {
        let moved = self.history.forward();
        self.pump();
        moved
    }

    /// Dispatches a click at `target` and acts on overlay controls.
    pub fn click(&mut self, target: NodeId) -> QfResult<Option<ClickOutcome>> {
        self.document.dispatch_event(InputEvent::click(target));
        let outcome = self.controller.handle_click(&mut self.document, target);
        if let Err(error) = &outcome {
            warn!(%target, %error, "overlay control failed");
        }
        self.pump();
        outcome
    }

    /// Dispatches a document-level input event, e.g. a wheel or key press.
    pub fn dispatch(&self, event: InputEvent) -> InputEvent {
        self.document.dispatch_event(event)
    }

    /// Applies a page-side edit, then picks up the mutations it caused.
    pub fn mutate<R>(&mut self, edit: impl FnOnce(&mut Document) -> R) -> R {
        let result = edit(&mut self.document);
        self.pump();
        result
    }

    /// Toggle button of the overlay standing in for `element`.
    pub fn toggle_control(&self, element: NodeId) -> Option<NodeId> {
        self.overlay_control(element, TOGGLE_CLASS)
    }

    pub fn save_control(&self, element: NodeId) -> Option<NodeId> {
        self.overlay_control(element, SAVE_CLASS)
    }

    /// Connected tracked elements in document order.
    pub fn tracked_items(&self) -> Vec<NodeId> {
        let registry = self.controller.registry();
        self.document
            .descendants(self.document.root())
            .into_iter()
            .filter(|node| registry.is_tracked(*node))
            .collect()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn controller(&self) -> &PageController<B> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PageController<B> {
        &mut self.controller
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn pending_passes(&self) -> usize {
        self.timers.pending_count()
    }

    pub fn mutation_watcher(&self) -> &MutationWatcher {
        &self.mutations
    }

    /// Every pass run so far, oldest first.
    pub fn reports(&self) -> &[PassReport] {
        &self.reports
    }

    fn overlay_control(&self, element: NodeId, class: &str) -> Option<NodeId> {
        let overlay = self.controller.registry().record(element)?.overlay;
        self.document
            .children(overlay)
            .iter()
            .copied()
            .find(|child| self.document.has_class(*child, class))
    }

    fn on_navigation(&mut self, event: &NavigationEvent) {
        debug!(kind = event.kind.as_str(), url = %event.url, "navigation signal received");
        if self.controller.handle_navigation(&mut self.document, &event.url) {
            self.settle
                .arm(&mut self.timers, self.settle_delay, PassTrigger::Navigation);
        }
    }

    fn run_pass(&mut self, trigger: PassTrigger) -> Option<PassReport> {
        debug!(trigger = trigger.as_str(), at_ms = self.timers.now().as_millis(), "running pass");
        let report = self.controller.process_page(&mut self.document)?;
        self.reports.push(report.clone());
        Some(report)
    }
}
