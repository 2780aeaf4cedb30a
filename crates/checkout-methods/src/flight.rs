//! In-flight submission guard shared by the widgets.
//!
//! Holds the checkout's busy flag for the duration of one settlement call.
//! If the submitting future is dropped before it resolves, the widget state
//! is rolled back to its interactive phase and the flag is released, so a
//! cancelled call can never wedge the widget.

use checkout_core::BusyGuard;
use std::sync::{Mutex, MutexGuard};

/// Lock a widget state mutex, recovering from poisoning
pub(crate) fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct InFlight<'a, S> {
    state: &'a Mutex<S>,
    rollback: fn(&mut S),
    armed: bool,
    _busy: BusyGuard,
}

impl<'a, S> InFlight<'a, S> {
    pub(crate) fn new(state: &'a Mutex<S>, busy: BusyGuard, rollback: fn(&mut S)) -> Self {
        Self {
            state,
            rollback,
            armed: true,
            _busy: busy,
        }
    }

    /// The call resolved; the caller has moved the state on itself.
    /// Dropping the returned value releases the busy flag.
    pub(crate) fn complete(mut self) {
        self.armed = false;
    }
}

impl<S> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(self.state);
            (self.rollback)(&mut state);
        }
    }
}
