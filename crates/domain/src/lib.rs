//! Domain layer for storefront checkout.
//!
//! This crate provides:
//! - Value objects for money, carts, coupons, orders and gateway payments
//! - The `Aggregate`/`DomainEvent` traits used to fold checkout events into state
//! - Idempotency keys for duplicate-safe order creation

pub mod aggregate;
pub mod cart;
pub mod coupon;
pub mod error;
pub mod idempotency;
pub mod money;
pub mod order;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{CartFingerprint, CartLine, CartSnapshot, ProductId};
pub use coupon::{Coupon, CouponCode, CouponValidation, DiscountType};
pub use error::DomainError;
pub use idempotency::IdempotencyKey;
pub use money::{Currency, Money};
pub use order::{Order, OrderId, OrderStatus};
pub use payment::{CaptureOutcome, CaptureRecord, PaymentOrder};
