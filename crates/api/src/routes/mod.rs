//! HTTP route handlers.

pub mod checkout;
pub mod coupons;
pub mod health;
pub mod metrics;
pub mod orders;
