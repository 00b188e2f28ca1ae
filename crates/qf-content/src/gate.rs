//! "Is a processing pass running" flag.

use std::cell::Cell;
use std::rc::Rc;

/// Shared re-entrancy flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ProcessingGate {
    running: Rc<Cell<bool>>,
}

impl ProcessingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Closes the gate until the returned guard drops. `None` if a pass is
    /// already running.
    pub fn try_enter(&self) -> Option<GateGuard> {
        if self.running.replace(true) {
            return None;
        }
        Some(GateGuard {
            running: Rc::clone(&self.running),
        })
    }
}

/// Reopens the gate on drop.
#[derive(Debug)]
pub struct GateGuard {
    running: Rc<Cell<bool>>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.running.set(false);
    }
}
