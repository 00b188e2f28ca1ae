//! Scroll lock for the immersive short-video viewer.

use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::EventKind;
use qf_dom::InputEvent;
use qf_dom::ListenerId;
use qf_dom::ListenerOptions;
use qf_policy::BlockingPolicy;
use qf_policy::LocationMode;
use std::rc::Rc;
use tracing::debug;

/// State captured on activation and given back on deactivation.
#[derive(Debug)]
struct ActiveLock {
    listeners: Vec<ListenerId>,
    /// Body's inline `overflow` before activation; `None` if it had none.
    prior_overflow: Option<String>,
}

/// Blocks wheel, touch and keyboard scrolling while the viewer is open.
/// `enable` and `disable` are each idempotent.
#[derive(Debug)]
pub struct ModePreventer {
    policy: Rc<BlockingPolicy>,
    active: Option<ActiveLock>,
}

impl ModePreventer {
    pub fn new(policy: Rc<BlockingPolicy>) -> Self {
        Self {
            policy,
            active: None,
        }
    }

    pub fn from_policy(policy: &BlockingPolicy) -> Self {
        Self::new(Rc::new(policy.clone()))
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn listener_ids(&self) -> &[ListenerId] {
        match &self.active {
            Some(lock) => &lock.listeners,
            None => &[],
        }
    }

    /// Active iff `mode` is the immersive viewer. Returns true if the state
    /// changed.
    pub fn update(&mut self, document: &mut Document, mode: LocationMode) -> QfResult<bool> {
        if mode == LocationMode::ImmersiveViewer {
            self.enable(document)
        } else {
            self.disable(document)
        }
    }

    pub fn enable(&mut self, document: &mut Document) -> QfResult<bool> {
        if self.active.is_some() {
            return Ok(false);
        }

        let body = document.body();
        let prior_overflow = document.style_property(body, "overflow").map(str::to_owned);
        document.set_style_property(body, "overflow", "hidden")?;

        let options = ListenerOptions::blocking_capture();
        let mut listeners = Vec::with_capacity(3);
        for kind in [EventKind::Wheel, EventKind::TouchMove] {
            listeners.push(document.add_event_listener(kind, options, Box::new(cancel)));
        }
        let policy = Rc::clone(&self.policy);
        listeners.push(document.add_event_listener(
            EventKind::KeyDown,
            options,
            Box::new(move |event: &mut InputEvent| {
                let blocked = event
                    .key
                    .as_deref()
                    .is_some_and(|key| policy.blocks_key(key));
                if blocked {
                    cancel(event);
                }
            }),
        ));

        debug!(prior_overflow = ?prior_overflow, "scroll lock enabled");
        self.active = Some(ActiveLock {
            listeners,
            prior_overflow,
        });
        Ok(true)
    }

    pub fn disable(&mut self, document: &mut Document) -> QfResult<bool> {
        let Some(lock) = self.active.take() else {
            return Ok(false);
        };

        for id in &lock.listeners {
            document.remove_event_listener(*id);
        }

        let body = document.body();
        match lock.prior_overflow.as_deref() {
            Some(overflow) => document.set_style_property(body, "overflow", overflow)?,
            None => {
                document.remove_style_property(body, "overflow")?;
            }
        }

        debug!("scroll lock disabled");
        Ok(true)
    }
}

fn cancel(event: &mut InputEvent) {
    event.prevent_default();
    event.stop_propagation();
}

#[cfg(test)]
mod tests {
    use super::ModePreventer;
    use qf_dom::Document;
    use qf_dom::EventKind;
    use qf_dom::InputEvent;
    use qf_policy::BlockingPolicy;
    use qf_policy::LocationMode;
    use qf_policy::PipelineConfig;

    fn preventer() -> ModePreventer {
        ModePreventer::from_policy(&BlockingPolicy::default())
    }

    #[test]
    fn enable_and_disable_are_idempotent() {
        let mut document = Document::new();
        let mut preventer = preventer();

        assert_eq!(preventer.enable(&mut document), Ok(true));
        assert_eq!(preventer.enable(&mut document), Ok(false));
        assert_eq!(document.listener_count(EventKind::Wheel), 1);
        assert_eq!(document.listener_count(EventKind::TouchMove), 1);
        assert_eq!(document.listener_count(EventKind::KeyDown), 1);
        assert_eq!(preventer.listener_ids().len(), 3);

        assert_eq!(preventer.disable(&mut document), Ok(true));
        assert_eq!(preventer.disable(&mut document), Ok(false));
        assert_eq!(document.listener_count(EventKind::Wheel), 0);
        assert_eq!(document.listener_count(EventKind::KeyDown), 0);
        assert!(preventer.listener_ids().is_empty());
    }

    #[test]
    fn restores_non_default_overflow_exactly() {
        let mut document = Document::new();
        let body = document.body();
        assert!(document.set_attribute(body, "style", "color: red; overflow: scroll").is_ok());
        let mut preventer = preventer();

        assert!(preventer.enable(&mut document).is_ok());
        assert_eq!(document.style_property(body, "overflow"), Some("hidden"));
        assert!(preventer.disable(&mut document).is_ok());

        assert_eq!(document.style_property(body, "overflow"), Some("scroll"));
        assert_eq!(document.style_property(body, "color"), Some("red"));
    }

    #[test]
    fn absent_overflow_is_removed_again() {
        let mut document = Document::new();
        let body = document.body();
        let mut preventer = preventer();

        assert!(preventer.enable(&mut document).is_ok());
        assert!(preventer.disable(&mut document).is_ok());
        assert_eq!(document.style_property(body, "overflow"), None);
    }

    #[test]
    fn cancels_scroll_input_but_not_other_keys() {
        let mut document = Document::new();
        let mut preventer = preventer();
        assert!(preventer.enable(&mut document).is_ok());

        let wheel = document.dispatch_event(InputEvent::wheel());
        assert!(wheel.is_default_prevented());
        assert!(wheel.is_propagation_stopped());

        let touch = document.dispatch_event(InputEvent::touch_move());
        assert!(touch.is_default_prevented());

        let arrow = document.dispatch_event(InputEvent::key_down("ArrowDown"));
        assert!(arrow.is_default_prevented());

        let letter = document.dispatch_event(InputEvent::key_down("k"));
        assert!(!letter.is_default_prevented());
        assert!(!letter.is_propagation_stopped());
    }

    #[test]
    fn keydown_follows_the_configured_scroll_keys() {
        let mut config = PipelineConfig::default();
        config.scroll_lock.keys = vec!["j".to_owned()];
        let mut document = Document::new();
        let mut preventer = ModePreventer::from_policy(&BlockingPolicy::new(config));
        assert!(preventer.enable(&mut document).is_ok());

        assert!(document.dispatch_event(InputEvent::key_down("j")).is_default_prevented());
        assert!(!document.dispatch_event(InputEvent::key_down("ArrowDown")).is_default_prevented());
    }

    #[test]
    fn update_follows_location_mode() {
        let mut document = Document::new();
        let mut preventer = preventer();

        assert_eq!(preventer.update(&mut document, LocationMode::ImmersiveViewer), Ok(true));
        assert_eq!(preventer.update(&mut document, LocationMode::ImmersiveViewer), Ok(false));
        assert_eq!(document.listener_count(EventKind::Wheel), 1);

        assert_eq!(preventer.update(&mut document, LocationMode::Landing), Ok(true));
        assert_eq!(preventer.update(&mut document, LocationMode::Other), Ok(false));
        assert!(!preventer.is_active());
    }
}
