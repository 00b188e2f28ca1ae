//! Session history with push/replace/traverse entry points.

use qf_core::QfError;
use qf_core::QfResult;
use std::fmt;
use url::Url;

/// Which history entry point produced a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

impl NavigationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Replace => "replace",
            Self::Pop => "pop",
        }
    }
}

/// Notification sent to history subscribers after an entry point ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub url: String,
}

pub type NavigationListener = Box<dyn FnMut(&NavigationEvent)>;

/// Joint session history of a single tab. URLs are resolved against the
/// current entry, like `history.pushState(null, "", "/path")`.
pub struct History {
    entries: Vec<Url>,
    index: usize,
    listeners: Vec<NavigationListener>,
}

impl History {
    pub fn new(initial_url: &str) -> QfResult<Self> {
        let url = Url::parse(initial_url).map_err(|error| {
            QfError::new(
                "history.url_invalid",
                format!("failed to parse URL `{initial_url}`: {error}"),
            )
        })?;

        Ok(Self {
            entries: vec![url],
            index: 0,
            listeners: Vec::new(),
        })
    }

    /// Current location as an absolute URL string.
    pub fn location(&self) -> &str {
        self.current().as_str()
    }

    pub fn current(&self) -> &Url {
        // `entries` is never empty and `index` always points inside it.
        &self.entries[self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subscribe(&mut self, listener: NavigationListener) {
        self.listeners.push(listener);
    }

    pub fn push_state(&mut self, url: &str) -> QfResult<()> {
        let resolved = self.resolve(url)?;
        self.entries.truncate(self.index.saturating_add(1));
        self.entries.push(resolved);
        self.index = self.entries.len() - 1;
        self.notify(NavigationKind::Push);
        Ok(())
    }

    pub fn replace_state(&mut self, url: &str) -> QfResult<()> {
        let resolved = self.resolve(url)?;
        self.entries[self.index] = resolved;
        self.notify(NavigationKind::Replace);
        Ok(())
    }

    pub fn back(&mut self) -> bool {
        self.go(-1)
    }

    pub fn forward(&mut self) -> bool {
        self.go(1)
    }

    /// Traverses `delta` entries. Out-of-range traversals are ignored.
    pub fn go(&mut self, delta: isize) -> bool {
        let Some(target) = self.index.checked_add_signed(delta) else {
            return false;
        };
        if delta == 0 || target >= self.entries.len() {
            return false;
        }

        self.index = target;
        self.notify(NavigationKind::Pop);
        true
    }

    fn resolve(&self, url: &str) -> QfResult<Url> {
        self.current().join(url).map_err(|error| {
            QfError::new(
                "history.url_invalid",
                format!("failed to resolve `{url}` against `{}`: {error}", self.location()),
            )
        })
    }

    fn notify(&mut self, kind: NavigationKind) {
        let event = NavigationEvent {
            kind,
            url: self.location().to_owned(),
        };
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("location", &self.location())
            .field("index", &self.index)
            .field("entries", &self.entries.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use super::NavigationEvent;
    use super::NavigationKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_history(url: &str) -> (History, Rc<RefCell<Vec<NavigationEvent>>>) {
        let mut history = History::new(url).unwrap_or_else(|_| unreachable!());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        history.subscribe(Box::new(move |event| sink.borrow_mut().push(event.clone())));
        (history, seen)
    }

    #[test]
    fn push_resolves_relative_urls_and_notifies() {
        let (mut history, seen) = recording_history("https://www.youtube.com/");
        assert!(history.push_state("/shorts/abc123").is_ok());
        assert_eq!(history.location(), "https://www.youtube.com/shorts/abc123");
        assert_eq!(
            seen.borrow().as_slice(),
            &[NavigationEvent {
                kind: NavigationKind::Push,
                url: "https://www.youtube.com/shorts/abc123".to_owned(),
            }]
        );
    }

    #[test]
    fn back_and_forward_emit_pop_events() {
        let (mut history, seen) = recording_history("https://www.youtube.com/");
        assert!(history.push_state("/feed/subscriptions").is_ok());
        assert!(history.back());
        assert_eq!(history.location(), "https://www.youtube.com/");
        assert!(history.forward());
        assert!(!history.forward());

        let kinds: Vec<_> = seen.borrow().iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![NavigationKind::Push, NavigationKind::Pop, NavigationKind::Pop]
        );
    }

    #[test]
    fn push_after_back_drops_forward_entries() {
        let (mut history, _) = recording_history("https://www.youtube.com/");
        assert!(history.push_state("/a").is_ok());
        assert!(history.push_state("/b").is_ok());
        assert!(history.back());
        assert!(history.push_state("/c").is_ok());
        assert_eq!(history.len(), 3);
        assert!(!history.forward());
    }

    #[test]
    fn replace_keeps_entry_count() {
        let (mut history, seen) = recording_history("https://www.youtube.com/watch?v=1");
        assert!(history.replace_state("/watch?v=2").is_ok());
        assert_eq!(history.len(), 1);
        assert_eq!(seen.borrow()[0].kind, NavigationKind::Replace);
    }

    #[test]
    fn rejects_invalid_initial_url() {
        let history = History::new("not a url");
        assert!(history.is_err());
    }
}
