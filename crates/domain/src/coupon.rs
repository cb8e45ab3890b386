//! Coupon value objects.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// How a coupon's discount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// A fixed amount in minor units.
    Flat,
    /// A percentage of the order amount, computed server-side.
    Percentage,
}

impl DiscountType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Flat => "flat",
            DiscountType::Percentage => "percentage",
        }
    }
}

/// A coupon code as typed by the user, trimmed and known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Parses user input.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::BlankCouponCode);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A coupon as the coupon service describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Minor units for [`DiscountType::Flat`], whole percent for
    /// [`DiscountType::Percentage`]. Display only.
    pub discount_amount: i64,
    pub coupon_name: String,
}

impl Coupon {
    /// Returns the label shown next to the discount, e.g. `"10% off"`.
    pub fn display_label(&self) -> String {
        match self.discount_type {
            DiscountType::Flat => format!("{} off", self.discount_amount),
            DiscountType::Percentage => format!("{}% off", self.discount_amount),
        }
    }
}

/// Result of validating a coupon against an order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    /// Discount computed by the server; zero when invalid.
    pub discount: Money,
    pub coupon: Option<Coupon>,
    /// Reason shown to the user when the code was not accepted.
    pub message: Option<String>,
}

impl CouponValidation {
    /// An accepted coupon with its server-computed discount.
    pub fn accepted(coupon: Coupon, discount: Money) -> Self {
        Self {
            valid: true,
            discount,
            coupon: Some(coupon),
            message: None,
        }
    }

    /// A rejected code with a user-facing reason.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            discount: Money::zero(),
            coupon: None,
            message: Some(message.into()),
        }
    }
}
