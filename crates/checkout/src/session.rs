//! Checkout session aggregate.

use common::{SessionId, UserId};
use domain::{
    Aggregate, CaptureRecord, CouponCode, IdempotencyKey, Money, OrderId, ProductId,
};
use serde::{Deserialize, Serialize};

use crate::events::{CheckoutEvent, PurchaseRoute};
use crate::state::CheckoutState;

/// A failure as recorded in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: String,
    pub reason: String,
}

/// One checkout attempt, folded from its events.
///
/// Client-local and discarded once terminal; the server-side order is the
/// durable record. Also the owner of the coupon applied to this attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    id: Option<SessionId>,
    version: u64,
    state: CheckoutState,
    user_id: Option<UserId>,
    subtotal: Money,
    product_ids: Vec<ProductId>,
    idempotency_key: Option<IdempotencyKey>,
    free_entitlement: Option<bool>,
    coupon_code: Option<CouponCode>,
    discount: Money,
    final_amount: Money,
    order_id: Option<OrderId>,
    gateway_order_id: Option<String>,
    payment_record_id: Option<String>,
    gateway_amount_subunits: Option<i64>,
    gateway_payment_id: Option<String>,
    capture: Option<CaptureRecord>,
    route: Option<PurchaseRoute>,
    failure: Option<FailureRecord>,
    unresolved: bool,
}

impl Aggregate for CheckoutSession {
    type Event = CheckoutEvent;
    type Id = SessionId;

    fn aggregate_type() -> &'static str {
        "CheckoutSession"
    }

    fn id(&self) -> Option<SessionId> {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        self.version += 1;
        if let Some(next) = event.target_state() {
            self.state = next;
        }

        match event {
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.session_id);
                self.user_id = data.user_id;
                self.subtotal = data.subtotal;
                self.final_amount = data.subtotal;
            }
            CheckoutEvent::CartValidated(data) => {
                self.product_ids = data.product_ids;
                self.idempotency_key = Some(data.idempotency_key);
            }
            CheckoutEvent::EntitlementResolved(data) => {
                self.free_entitlement = Some(data.free);
            }
            CheckoutEvent::PricingResolved(data) => {
                self.coupon_code = data.coupon_code;
                self.discount = data.discount;
                self.final_amount = data.final_amount;
            }
            CheckoutEvent::OrderCreated(data) => {
                self.order_id = Some(data.order_id);
            }
            CheckoutEvent::FreePurchaseCreated(data) => {
                self.order_id = Some(data.order_id);
                self.final_amount = Money::zero();
            }
            CheckoutEvent::GatewayOrderCreated(data) => {
                self.gateway_order_id = Some(data.gateway_order_id);
                self.payment_record_id = Some(data.payment_record_id);
            }
            CheckoutEvent::GatewayOpened(data) => {
                self.gateway_amount_subunits = Some(data.amount_subunits);
            }
            CheckoutEvent::GatewayPaymentCompleted(data) => {
                self.gateway_payment_id = Some(data.gateway_payment_id);
            }
            CheckoutEvent::CaptureRecorded(record) => {
                self.capture = Some(record);
            }
            CheckoutEvent::Reconciled(_) => {}
            CheckoutEvent::CheckoutSucceeded(data) => {
                self.order_id = Some(data.order_id);
                self.route = Some(data.route);
            }
            CheckoutEvent::CheckoutFailed(data) => {
                self.failure = Some(FailureRecord {
                    kind: data.kind,
                    reason: data.reason,
                });
            }
            CheckoutEvent::CheckoutUnresolved(data) => {
                self.order_id = Some(data.order_id);
                self.unresolved = true;
            }
        }
    }
}

// Query methods
impl CheckoutSession {
    /// Returns the saga state.
    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Returns the user who started the checkout.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the cart subtotal.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Returns the validated product ids, one per cart line.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    /// Returns the idempotency key sent with order creation.
    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    /// Returns the entitlement answer, once known.
    pub fn free_entitlement(&self) -> Option<bool> {
        self.free_entitlement
    }

    /// Returns the coupon applied to this attempt.
    pub fn coupon_code(&self) -> Option<&CouponCode> {
        self.coupon_code.as_ref()
    }

    /// Returns the server-computed discount.
    pub fn discount(&self) -> Money {
        self.discount
    }

    /// Returns the payable total, `max(0, subtotal - discount)`.
    pub fn final_amount(&self) -> Money {
        self.final_amount
    }

    /// Returns the server-issued order id.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// Returns the gateway payment order id.
    pub fn gateway_order_id(&self) -> Option<&str> {
        self.gateway_order_id.as_deref()
    }

    /// Returns the internal payment record id.
    pub fn payment_record_id(&self) -> Option<&str> {
        self.payment_record_id.as_deref()
    }

    /// Returns the amount handed to the gateway sheet, in gateway sub-units.
    pub fn gateway_amount_subunits(&self) -> Option<i64> {
        self.gateway_amount_subunits
    }

    /// Returns the gateway's payment id.
    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.gateway_payment_id.as_deref()
    }

    /// Returns the capture record, if capture was attempted.
    pub fn capture(&self) -> Option<&CaptureRecord> {
        self.capture.as_ref()
    }

    /// Returns the route that produced the order, on success.
    pub fn route(&self) -> Option<PurchaseRoute> {
        self.route
    }

    /// Returns the recorded failure, if any.
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// Returns true if the attempt ended without knowing whether it was charged.
    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }
}
