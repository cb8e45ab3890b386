//! Free-entitlement resolution.

use common::UserId;
use domain::CartSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::services::EntitlementService;

/// Whether the cart is free for this user, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub free: bool,
    /// The plan that covers the cart.
    pub reason: Option<String>,
}

impl Entitlement {
    /// The cart must be paid for.
    pub fn paid() -> Self {
        Self {
            free: false,
            reason: None,
        }
    }
}

/// Decides whether the user's active plan makes the cart free.
///
/// Asks the entitlement service on every call; answers are never cached
/// across checkout attempts.
pub struct FreeEntitlementResolver<'a, E: EntitlementService> {
    service: &'a E,
}

impl<'a, E: EntitlementService> FreeEntitlementResolver<'a, E> {
    /// Creates a resolver over the given entitlement service.
    pub fn new(service: &'a E) -> Self {
        Self { service }
    }

    /// Resolves the entitlement for `user_id` buying `cart`.
    ///
    /// An empty cart is never free and costs no call. A service failure is
    /// an error: the cart is neither assumed free nor assumed paid.
    #[tracing::instrument(skip(self, cart), fields(lines = cart.line_count()))]
    pub async fn resolve(
        &self,
        user_id: UserId,
        cart: &CartSnapshot,
    ) -> Result<Entitlement, CheckoutError> {
        if cart.is_empty() {
            return Ok(Entitlement::paid());
        }

        let status = self
            .service
            .check(user_id)
            .await
            .map_err(CheckoutError::service("check_entitlement"))?;

        let entitlement = Entitlement {
            free: status.will_be_free,
            reason: status.plan_name.filter(|_| status.will_be_free),
        };
        tracing::info!(free = entitlement.free, plan = ?entitlement.reason, "entitlement resolved");
        Ok(entitlement)
    }
}
