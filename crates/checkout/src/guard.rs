//! The "checkout in progress" guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Best-effort guard against starting a second checkout while one runs.
///
/// One flag per client. It does not protect across processes or devices;
/// duplicate orders from those are collapsed server-side by the idempotency
/// key.
#[derive(Debug, Clone, Default)]
pub struct CheckoutGuard {
    active: Arc<AtomicBool>,
}

impl CheckoutGuard {
    /// Creates an idle guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag if it is clear. The flag clears when the token drops.
    pub fn try_acquire(&self) -> Option<GuardToken> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                active: Arc::clone(&self.active),
            })
    }

    /// Returns true while a checkout holds the guard.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true if no clone or token other than `self` refers to the flag.
    pub fn is_sole_handle(&self) -> bool {
        Arc::strong_count(&self.active) == 1
    }
}

/// Held for the duration of one checkout.
#[derive(Debug)]
pub struct GuardToken {
    active: Arc<AtomicBool>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
