//! Shared application state.

use std::collections::HashMap;
use std::sync::Mutex;

use checkout::{CheckoutGuard, InMemoryCheckoutOrchestrator};
use common::UserId;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: InMemoryCheckoutOrchestrator,
    /// One in-progress guard per shopper.
    guards: Mutex<HashMap<UserId, CheckoutGuard>>,
}

impl AppState {
    /// Wraps an orchestrator.
    pub fn new(orchestrator: InMemoryCheckoutOrchestrator) -> Self {
        Self {
            orchestrator,
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the in-progress guard for `user_id`, creating it on first use.
    pub fn guard_for(&self, user_id: UserId) -> CheckoutGuard {
        self.guards
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .clone()
    }

    /// Drops the guard for `user_id` once nothing else holds it.
    ///
    /// A handler that still has a clone keeps the entry alive, so two
    /// checkouts for one shopper never see different guards.
    pub fn release_guard(&self, user_id: UserId) {
        let mut guards = self.guards.lock().unwrap();
        if guards
            .get(&user_id)
            .is_some_and(|guard| guard.is_sole_handle() && !guard.is_active())
        {
            guards.remove(&user_id);
        }
    }

    /// Returns the number of shoppers with a tracked guard.
    pub fn guard_count(&self) -> usize {
        self.guards.lock().unwrap().len()
    }
}
