//! # Busy Flag
//!
//! The single "processing" flag of a checkout. The orchestrator owns it and
//! hands clones to every widget; a widget must hold a [`BusyGuard`] for the
//! whole of its network call. Because the flag is shared, at most one
//! submission is in flight across all methods of a checkout, and the
//! orchestrator can observe (or impose) processing at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cloneable processing flag
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    inner: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a guard is currently held
    pub fn is_busy(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Take the flag, or `None` if someone else holds it
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.inner
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                flag: self.inner.clone(),
            })
    }
}

/// Holds the busy flag; releases it on drop
#[derive(Debug)]
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Closes once the order has a successful settlement.
///
/// Shared like [`BusyFlag`]; widgets check it while holding the busy guard,
/// so no second charge can start after the order left awaiting-payment.
#[derive(Debug, Clone, Default)]
pub struct OrderGate {
    closed: Arc<AtomicBool>,
}

impl OrderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
