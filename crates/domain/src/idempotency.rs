//! Idempotency keys for order creation.

use common::UserId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cart::CartSnapshot;
use crate::coupon::CouponCode;
use crate::money::Money;

/// Key the order service uses to collapse duplicate submissions of one cart.
///
/// [`IdempotencyKey::for_cart`] identifies the user's cart. The key sent with
/// an order is [`IdempotencyKey::priced`], which also binds the coupon and
/// the amount, so a retry at a different price is a different submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives the key for `(user, cart)`.
    pub fn for_cart(user_id: UserId, cart: &CartSnapshot) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_uuid().as_bytes());
        hasher.update(cart.fingerprint().as_str().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Derives the order key for this cart priced with `coupon_code` at
    /// `final_amount`.
    pub fn priced(&self, coupon_code: Option<&CouponCode>, final_amount: Money) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.update(b"|");
        if let Some(code) = coupon_code {
            hasher.update(code.as_str().as_bytes());
        }
        hasher.update(b"|");
        hasher.update(final_amount.minor().to_be_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
