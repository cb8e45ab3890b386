//! Coupon validation service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Coupon, CouponCode, CouponValidation, DiscountType, Money};

use crate::error::ServiceError;

/// Server-side coupon validation.
#[async_trait]
pub trait CouponService: Send + Sync {
    /// Validates `code` against `order_amount` and computes the discount.
    ///
    /// An unknown or inapplicable code is `Ok` with `valid == false`; `Err`
    /// means the service itself failed.
    async fn validate(
        &self,
        code: &CouponCode,
        order_amount: Money,
    ) -> Result<CouponValidation, ServiceError>;
}

/// A coupon plus the conditions under which it applies.
#[derive(Debug, Clone)]
pub struct CouponRule {
    pub coupon: Coupon,
    pub min_order: Money,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CouponRule {
    /// A rule with no minimum and no expiry.
    pub fn always(coupon: Coupon) -> Self {
        Self {
            coupon,
            min_order: Money::zero(),
            expires_at: None,
        }
    }

    /// Computes the discount for `order_amount`, never exceeding it.
    pub fn discount_for(&self, order_amount: Money) -> Money {
        let amount = order_amount.minor().max(0);
        let discount = match self.coupon.discount_type {
            DiscountType::Flat => self.coupon.discount_amount,
            DiscountType::Percentage => {
                let percent = i128::from(self.coupon.discount_amount.clamp(0, 100));
                (i128::from(amount) * percent / 100) as i64
            }
        };
        order_amount.clamp_discount(Money::from_minor(discount))
    }
}

#[derive(Debug, Default)]
struct InMemoryCouponState {
    rules: HashMap<String, CouponRule>,
    validations: usize,
    unavailable: bool,
}

/// In-memory coupon service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponService {
    state: Arc<RwLock<InMemoryCouponState>>,
}

impl InMemoryCouponService {
    /// Creates a new in-memory coupon service with no coupons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flat coupon worth `amount` minor units.
    pub fn add_flat(&self, code: &str, amount: i64) {
        self.add_rule(CouponRule::always(coupon(code, DiscountType::Flat, amount)));
    }

    /// Registers a percentage coupon.
    pub fn add_percentage(&self, code: &str, percent: i64) {
        self.add_rule(CouponRule::always(coupon(
            code,
            DiscountType::Percentage,
            percent,
        )));
    }

    /// Registers a coupon rule, replacing any rule with the same code.
    pub fn add_rule(&self, rule: CouponRule) {
        let key = rule.coupon.code.as_str().to_ascii_uppercase();
        self.state.write().unwrap().rules.insert(key, rule);
    }

    /// Makes every call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of validate calls received.
    pub fn validation_count(&self) -> usize {
        self.state.read().unwrap().validations
    }
}

fn coupon(code: &str, discount_type: DiscountType, discount_amount: i64) -> Coupon {
    Coupon {
        code: CouponCode::parse(code).expect("coupon code must not be blank"),
        discount_type,
        discount_amount,
        coupon_name: code.trim().to_string(),
    }
}

#[async_trait]
impl CouponService for InMemoryCouponService {
    async fn validate(
        &self,
        code: &CouponCode,
        order_amount: Money,
    ) -> Result<CouponValidation, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.validations += 1;

        if state.unavailable {
            return Err(ServiceError::Unavailable("coupon service down".to_string()));
        }

        let Some(rule) = state.rules.get(&code.as_str().to_ascii_uppercase()) else {
            return Ok(CouponValidation::rejected("Invalid coupon code"));
        };

        if rule.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Ok(CouponValidation::rejected("This coupon has expired"));
        }

        if order_amount < rule.min_order {
            return Ok(CouponValidation::rejected(format!(
                "Minimum order amount for this coupon is {}",
                rule.min_order
            )));
        }

        Ok(CouponValidation::accepted(
            rule.coupon.clone(),
            rule.discount_for(order_amount),
        ))
    }
}
