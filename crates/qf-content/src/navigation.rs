//! Client-side navigation detection.

use qf_dom::History;
use qf_dom::NavigationEvent;
use qf_dom::history::NavigationListener;
use std::sync::mpsc;
use tracing::trace;

/// Anything that can report push, replace and back/forward navigations.
pub trait NavigationSource {
    fn on_navigate(&mut self, listener: NavigationListener);
}

impl NavigationSource for History {
    fn on_navigate(&mut self, listener: NavigationListener) {
        self.subscribe(listener);
    }
}

/// Queues navigation signals until the content script is ready for them.
#[derive(Debug)]
pub struct NavigationWatcher {
    events: mpsc::Receiver<NavigationEvent>,
}

impl NavigationWatcher {
    /// Subscribes once to `source`. Signals arriving after the watcher is
    /// dropped are discarded.
    pub fn attach<S: NavigationSource + ?Sized>(source: &mut S) -> Self {
        let (sender, events) = mpsc::channel();
        source.on_navigate(Box::new(move |event: &NavigationEvent| {
            trace!(kind = event.kind.as_str(), url = %event.url, "navigation signal");
            let _ = sender.send(event.clone());
        }));
        Self { events }
    }

    /// Signals received since the previous call, oldest first.
    pub fn drain(&self) -> Vec<NavigationEvent> {
        self.events.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::NavigationWatcher;
    use qf_dom::History;
    use qf_dom::NavigationEvent;
    use qf_dom::NavigationKind;

    #[test]
    fn funnels_push_replace_and_pop() {
        let mut history =
            History::new("https://www.youtube.com/").unwrap_or_else(|_| unreachable!());
        let watcher = NavigationWatcher::attach(&mut history);

        assert!(history.push_state("/shorts/abc").is_ok());
        assert!(history.replace_state("/shorts/def").is_ok());
        assert!(history.back());

        assert_eq!(
            watcher.drain(),
            vec![
                NavigationEvent {
                    kind: NavigationKind::Push,
                    url: "https://www.youtube.com/shorts/abc".to_owned(),
                },
                NavigationEvent {
                    kind: NavigationKind::Replace,
                    url: "https://www.youtube.com/shorts/def".to_owned(),
                },
                NavigationEvent {
                    kind: NavigationKind::Pop,
                    url: "https://www.youtube.com/".to_owned(),
                },
            ]
        );
        assert!(watcher.drain().is_empty());
    }

    #[test]
    fn dropped_watcher_does_not_break_history() {
        let mut history =
            History::new("https://www.youtube.com/").unwrap_or_else(|_| unreachable!());
        drop(NavigationWatcher::attach(&mut history));
        assert!(history.push_state("/feed/subscriptions").is_ok());
        assert_eq!(history.location(), "https://www.youtube.com/feed/subscriptions");
    }
}
