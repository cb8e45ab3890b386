//! Checkout error types.

use domain::{DomainError, Money, OrderId};
use thiserror::Error;

/// Failures reported by the remote services checkout calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or did not answer.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The service answered and refused the request.
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Creates a `Rejected` error.
    pub fn rejected(message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            message: message.into(),
        }
    }
}

/// Problems detected before any server-side state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing to buy.
    #[error("Your cart is empty")]
    EmptyCart,

    /// No authenticated user.
    #[error("Please sign in to check out")]
    Unauthenticated,

    /// A cart line or coupon code failed to parse.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Coupons are only validated against a positive amount.
    #[error("Order amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    /// The coupon service did not accept the code for this cart.
    #[error("Coupon {code} cannot be applied: {reason}")]
    CouponRejected { code: String, reason: String },
}

/// Errors that end a checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Local validation failed; no network call was made for the failing check.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Merchant key missing or blank.
    #[error("Payment gateway is not configured: {0}")]
    GatewayConfig(String),

    /// The user abandoned the gateway or the gateway refused the payment.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// Capture did not answer definitively.
    #[error("Capture outcome unknown for order {order_id}")]
    CaptureAmbiguous { order_id: OrderId },

    /// Reconciliation could not confirm the charge.
    #[error("Payment for order {order_id} could not be confirmed")]
    UnresolvedPayment { order_id: OrderId },

    /// Amounts disagree between the order, the gateway and capture.
    #[error("Integrity error at {stage}: {detail}")]
    Integrity { stage: &'static str, detail: String },

    /// The order service answered without an order id.
    #[error("Order service did not return an order id")]
    MissingOrderId,

    /// A remote call failed.
    #[error("{operation} failed: {source}")]
    Service {
        operation: &'static str,
        source: ServiceError,
    },

    /// Another checkout holds the in-progress guard.
    #[error("A checkout is already in progress")]
    AlreadyInProgress,
}

impl CheckoutError {
    /// Wraps a service error with the operation that produced it.
    pub fn service(operation: &'static str) -> impl FnOnce(ServiceError) -> Self {
        move |source| CheckoutError::Service { operation, source }
    }

    /// Reports an amount mismatch.
    pub fn amount_mismatch(stage: &'static str, expected: Money, actual: Money) -> Self {
        CheckoutError::Integrity {
            stage,
            detail: format!("expected {expected}, got {actual}"),
        }
    }

    /// Stable label used in logs, metrics and the session journal.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation",
            CheckoutError::GatewayConfig(_) => "gateway_config",
            CheckoutError::PaymentFailed(_) => "payment_failed",
            CheckoutError::CaptureAmbiguous { .. } => "capture_ambiguous",
            CheckoutError::UnresolvedPayment { .. } => "unresolved_payment",
            CheckoutError::Integrity { .. } => "integrity",
            CheckoutError::MissingOrderId => "missing_order_id",
            CheckoutError::Service { .. } => "service",
            CheckoutError::AlreadyInProgress => "already_in_progress",
        }
    }

    /// Text shown to the shopper.
    ///
    /// Never suggests retrying payment once an order may have been charged.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(e) => e.to_string(),
            CheckoutError::GatewayConfig(_) => {
                "Payments are temporarily unavailable. Please try again later.".to_string()
            }
            CheckoutError::PaymentFailed(reason) => format!("Payment failed: {reason}"),
            CheckoutError::CaptureAmbiguous { .. } | CheckoutError::UnresolvedPayment { .. } => {
                "Your payment may have been processed. Please check your orders before trying again."
                    .to_string()
            }
            CheckoutError::Integrity { .. } => {
                "We could not verify the payment amount. Please contact support.".to_string()
            }
            CheckoutError::MissingOrderId | CheckoutError::Service { .. } => {
                "We could not place your order. Please try again.".to_string()
            }
            CheckoutError::AlreadyInProgress => "Your checkout is already in progress.".to_string(),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
