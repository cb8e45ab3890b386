//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout attempt.
///
/// State transitions:
/// ```text
/// Idle ──► Validating ──┬──► OrderCreated ──► GatewayOrderCreated ──► AwaitingGateway ──► Capturing ──┬──► Succeeded
///                       │                                                                              ├──► Reconciling ──┬──► Succeeded
///                       ├──► Succeeded (free purchase)                                                 │                  └──► Failed (unresolved)
///                       └──► Failed            (every non-terminal state may also go to Failed)        └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    /// No checkout started.
    #[default]
    Idle,

    /// Local checks, entitlement lookup and pricing.
    Validating,

    /// The server issued an order id; every later step refers to it.
    OrderCreated,

    /// The gateway created a payment order for the order.
    GatewayOrderCreated,

    /// The embedded gateway checkout is open; waiting on the shopper.
    AwaitingGateway,

    /// The shopper paid; capturing the payment.
    Capturing,

    /// Capture timed out; reading the order back to decide.
    Reconciling,

    /// Order placed and, if paid, payment confirmed (terminal state).
    Succeeded,

    /// Attempt ended without a confirmed order (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Succeeded | CheckoutState::Failed)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;

        if next == Failed {
            return !self.is_terminal() && *self != Idle;
        }
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, OrderCreated)
                | (Validating, Succeeded)
                | (OrderCreated, GatewayOrderCreated)
                | (GatewayOrderCreated, AwaitingGateway)
                | (AwaitingGateway, Capturing)
                | (Capturing, Succeeded)
                | (Capturing, Reconciling)
                | (Reconciling, Succeeded)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "Idle",
            CheckoutState::Validating => "Validating",
            CheckoutState::OrderCreated => "OrderCreated",
            CheckoutState::GatewayOrderCreated => "GatewayOrderCreated",
            CheckoutState::AwaitingGateway => "AwaitingGateway",
            CheckoutState::Capturing => "Capturing",
            CheckoutState::Reconciling => "Reconciling",
            CheckoutState::Succeeded => "Succeeded",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
