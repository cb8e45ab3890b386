//! Domain error types.

use thiserror::Error;

/// Errors raised while constructing or converting domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A cart line carried a product id that is not a positive integer.
    #[error("Invalid product id: {raw:?}")]
    InvalidProductId { raw: String },

    /// A monetary amount was negative.
    #[error("Invalid amount: {amount} (must not be negative)")]
    NegativeAmount { amount: i64 },

    /// A coupon code was empty after trimming.
    #[error("Coupon code must not be blank")]
    BlankCouponCode,

    /// Scaling an amount to gateway sub-units overflowed.
    #[error("Amount {amount} overflows when scaled by {multiplier}")]
    AmountOverflow { amount: i64, multiplier: i64 },

    /// Adding two amounts overflowed.
    #[error("Amount {left} + {right} overflows")]
    SumOverflow { left: i64, right: i64 },

    /// Currency code is not supported by the gateway.
    #[error("Unsupported currency: {code}")]
    UnsupportedCurrency { code: String },
}
