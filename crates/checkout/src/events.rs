//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{SessionId, UserId};
use domain::{
    CaptureOutcome, CaptureRecord, CouponCode, DomainEvent, IdempotencyKey, Money, OrderId,
    OrderStatus, ProductId,
};
use serde::{Deserialize, Serialize};

use crate::services::orders::FreePurchaseMethod;
use crate::state::CheckoutState;

/// Which route produced the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseRoute {
    /// Charged through the gateway.
    Paid,
    /// Covered by the user's plan.
    Entitlement,
    /// A coupon brought the total to zero.
    ZeroTotal,
}

impl PurchaseRoute {
    /// Returns the route name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseRoute::Paid => "paid",
            PurchaseRoute::Entitlement => "entitlement",
            PurchaseRoute::ZeroTotal => "zero_total",
        }
    }
}

impl From<FreePurchaseMethod> for PurchaseRoute {
    fn from(method: FreePurchaseMethod) -> Self {
        match method {
            FreePurchaseMethod::Subscription => PurchaseRoute::Entitlement,
            FreePurchaseMethod::Coupon => PurchaseRoute::ZeroTotal,
        }
    }
}

/// Events recorded while a checkout runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// A checkout attempt began.
    CheckoutStarted(CheckoutStartedData),

    /// The cart passed local checks.
    CartValidated(CartValidatedData),

    /// The entitlement service answered.
    EntitlementResolved(EntitlementResolvedData),

    /// Discount and payable total are fixed.
    PricingResolved(PricingResolvedData),

    /// The order service issued an order for the paid route.
    OrderCreated(OrderCreatedData),

    /// The order service issued a settled order through the free-purchase call.
    FreePurchaseCreated(FreePurchaseCreatedData),

    /// The gateway created a payment order.
    GatewayOrderCreated(GatewayOrderCreatedData),

    /// The embedded gateway checkout was opened.
    GatewayOpened(GatewayOpenedData),

    /// The shopper completed payment on the gateway.
    GatewayPaymentCompleted(GatewayPaymentCompletedData),

    /// The capture service answered.
    CaptureRecorded(CaptureRecord),

    /// The order was read back after an ambiguous capture.
    Reconciled(ReconciledData),

    /// The checkout ended with a confirmed order.
    CheckoutSucceeded(CheckoutSucceededData),

    /// The checkout ended without a confirmed order.
    CheckoutFailed(CheckoutFailedData),

    /// The checkout ended and the charge could not be confirmed either way.
    CheckoutUnresolved(CheckoutUnresolvedData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::CartValidated(_) => "CartValidated",
            CheckoutEvent::EntitlementResolved(_) => "EntitlementResolved",
            CheckoutEvent::PricingResolved(_) => "PricingResolved",
            CheckoutEvent::OrderCreated(_) => "OrderCreated",
            CheckoutEvent::FreePurchaseCreated(_) => "FreePurchaseCreated",
            CheckoutEvent::GatewayOrderCreated(_) => "GatewayOrderCreated",
            CheckoutEvent::GatewayOpened(_) => "GatewayOpened",
            CheckoutEvent::GatewayPaymentCompleted(_) => "GatewayPaymentCompleted",
            CheckoutEvent::CaptureRecorded(_) => "CaptureRecorded",
            CheckoutEvent::Reconciled(_) => "Reconciled",
            CheckoutEvent::CheckoutSucceeded(_) => "CheckoutSucceeded",
            CheckoutEvent::CheckoutFailed(_) => "CheckoutFailed",
            CheckoutEvent::CheckoutUnresolved(_) => "CheckoutUnresolved",
        }
    }
}

impl CheckoutEvent {
    /// The state this event moves the saga into, if it moves it at all.
    pub fn target_state(&self) -> Option<CheckoutState> {
        match self {
            CheckoutEvent::CheckoutStarted(_) => Some(CheckoutState::Validating),
            CheckoutEvent::OrderCreated(_) => Some(CheckoutState::OrderCreated),
            CheckoutEvent::GatewayOrderCreated(_) => Some(CheckoutState::GatewayOrderCreated),
            CheckoutEvent::GatewayOpened(_) => Some(CheckoutState::AwaitingGateway),
            CheckoutEvent::GatewayPaymentCompleted(_) => Some(CheckoutState::Capturing),
            CheckoutEvent::CaptureRecorded(record) if record.outcome == CaptureOutcome::Timeout => {
                Some(CheckoutState::Reconciling)
            }
            CheckoutEvent::CheckoutSucceeded(_) => Some(CheckoutState::Succeeded),
            CheckoutEvent::CheckoutFailed(_) | CheckoutEvent::CheckoutUnresolved(_) => {
                Some(CheckoutState::Failed)
            }
            _ => None,
        }
    }
}

/// Data for CheckoutStarted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub session_id: SessionId,
    /// None when nobody is signed in; validation rejects that.
    pub user_id: Option<UserId>,
    pub subtotal: Money,
    pub line_count: usize,
    pub started_at: DateTime<Utc>,
}

/// Data for CartValidated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartValidatedData {
    pub product_ids: Vec<ProductId>,
    pub idempotency_key: IdempotencyKey,
}

/// Data for EntitlementResolved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementResolvedData {
    pub free: bool,
    pub reason: Option<String>,
}

/// Data for PricingResolved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResolvedData {
    pub coupon_code: Option<CouponCode>,
    pub discount: Money,
    pub final_amount: Money,
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    /// Amount the server recorded, if it reported one.
    pub recorded_amount: Option<Money>,
}

/// Data for FreePurchaseCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePurchaseCreatedData {
    pub order_id: OrderId,
    pub payment_method: FreePurchaseMethod,
}

/// Data for GatewayOrderCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderCreatedData {
    pub gateway_order_id: String,
    pub payment_record_id: String,
    pub amount: Money,
}

/// Data for GatewayOpened event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOpenedData {
    pub amount_subunits: i64,
}

/// Data for GatewayPaymentCompleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPaymentCompletedData {
    pub gateway_payment_id: String,
}

/// Data for Reconciled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledData {
    /// None when the order could not be read.
    pub order_status: Option<OrderStatus>,
}

/// Data for CheckoutSucceeded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSucceededData {
    pub order_id: OrderId,
    pub route: PurchaseRoute,
    pub completed_at: DateTime<Utc>,
}

/// Data for CheckoutFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    /// Error kind label, see `CheckoutError::kind`.
    pub kind: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for CheckoutUnresolved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutUnresolvedData {
    pub order_id: OrderId,
    pub at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    /// Creates a CheckoutStarted event.
    pub fn checkout_started(
        session_id: SessionId,
        user_id: Option<UserId>,
        subtotal: Money,
        line_count: usize,
    ) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            session_id,
            user_id,
            subtotal,
            line_count,
            started_at: Utc::now(),
        })
    }

    /// Creates a CartValidated event.
    pub fn cart_validated(product_ids: Vec<ProductId>, idempotency_key: IdempotencyKey) -> Self {
        CheckoutEvent::CartValidated(CartValidatedData {
            product_ids,
            idempotency_key,
        })
    }

    /// Creates an EntitlementResolved event.
    pub fn entitlement_resolved(free: bool, reason: Option<String>) -> Self {
        CheckoutEvent::EntitlementResolved(EntitlementResolvedData { free, reason })
    }

    /// Creates a PricingResolved event.
    pub fn pricing_resolved(
        coupon_code: Option<CouponCode>,
        discount: Money,
        final_amount: Money,
    ) -> Self {
        CheckoutEvent::PricingResolved(PricingResolvedData {
            coupon_code,
            discount,
            final_amount,
        })
    }

    /// Creates an OrderCreated event.
    pub fn order_created(order_id: OrderId, recorded_amount: Option<Money>) -> Self {
        CheckoutEvent::OrderCreated(OrderCreatedData {
            order_id,
            recorded_amount,
        })
    }

    /// Creates a FreePurchaseCreated event.
    pub fn free_purchase_created(order_id: OrderId, payment_method: FreePurchaseMethod) -> Self {
        CheckoutEvent::FreePurchaseCreated(FreePurchaseCreatedData {
            order_id,
            payment_method,
        })
    }

    /// Creates a GatewayOrderCreated event.
    pub fn gateway_order_created(
        gateway_order_id: impl Into<String>,
        payment_record_id: impl Into<String>,
        amount: Money,
    ) -> Self {
        CheckoutEvent::GatewayOrderCreated(GatewayOrderCreatedData {
            gateway_order_id: gateway_order_id.into(),
            payment_record_id: payment_record_id.into(),
            amount,
        })
    }

    /// Creates a GatewayOpened event.
    pub fn gateway_opened(amount_subunits: i64) -> Self {
        CheckoutEvent::GatewayOpened(GatewayOpenedData { amount_subunits })
    }

    /// Creates a GatewayPaymentCompleted event.
    pub fn gateway_payment_completed(gateway_payment_id: impl Into<String>) -> Self {
        CheckoutEvent::GatewayPaymentCompleted(GatewayPaymentCompletedData {
            gateway_payment_id: gateway_payment_id.into(),
        })
    }

    /// Creates a CaptureRecorded event.
    pub fn capture_recorded(record: CaptureRecord) -> Self {
        CheckoutEvent::CaptureRecorded(record)
    }

    /// Creates a Reconciled event.
    pub fn reconciled(order_status: Option<OrderStatus>) -> Self {
        CheckoutEvent::Reconciled(ReconciledData { order_status })
    }

    /// Creates a CheckoutSucceeded event.
    pub fn checkout_succeeded(order_id: OrderId, route: PurchaseRoute) -> Self {
        CheckoutEvent::CheckoutSucceeded(CheckoutSucceededData {
            order_id,
            route,
            completed_at: Utc::now(),
        })
    }

    /// Creates a CheckoutFailed event.
    pub fn checkout_failed(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed(CheckoutFailedData {
            kind: kind.into(),
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    /// Creates a CheckoutUnresolved event.
    pub fn checkout_unresolved(order_id: OrderId) -> Self {
        CheckoutEvent::CheckoutUnresolved(CheckoutUnresolvedData {
            order_id,
            at: Utc::now(),
        })
    }
}
