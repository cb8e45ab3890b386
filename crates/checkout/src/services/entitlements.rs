//! Subscription entitlement service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Whether the user's active plan covers the current cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementStatus {
    pub will_be_free: bool,
    pub plan_name: Option<String>,
}

impl EntitlementStatus {
    /// The user has no plan that covers the cart.
    pub fn not_entitled() -> Self {
        Self {
            will_be_free: false,
            plan_name: None,
        }
    }
}

/// Active-subscription lookup for the authenticated user.
#[async_trait]
pub trait EntitlementService: Send + Sync {
    /// Checks whether `user_id` can take the cart for free.
    async fn check(&self, user_id: UserId) -> Result<EntitlementStatus, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryEntitlementState {
    plans: HashMap<UserId, String>,
    checks: usize,
    unavailable: bool,
}

/// In-memory entitlement service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlementService {
    state: Arc<RwLock<InMemoryEntitlementState>>,
}

impl InMemoryEntitlementService {
    /// Creates a new service where nobody is entitled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `user_id` an active plan that makes every cart free.
    pub fn grant_plan(&self, user_id: UserId, plan_name: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .plans
            .insert(user_id, plan_name.into());
    }

    /// Removes the user's plan.
    pub fn revoke_plan(&self, user_id: UserId) {
        self.state.write().unwrap().plans.remove(&user_id);
    }

    /// Makes every call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of checks received.
    pub fn check_count(&self) -> usize {
        self.state.read().unwrap().checks
    }
}

#[async_trait]
impl EntitlementService for InMemoryEntitlementService {
    async fn check(&self, user_id: UserId) -> Result<EntitlementStatus, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.checks += 1;

        if state.unavailable {
            return Err(ServiceError::Unavailable(
                "entitlement service down".to_string(),
            ));
        }

        Ok(match state.plans.get(&user_id) {
            Some(plan) => EntitlementStatus {
                will_be_free: true,
                plan_name: Some(plan.clone()),
            },
            None => EntitlementStatus::not_entitled(),
        })
    }
}
