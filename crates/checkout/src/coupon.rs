//! Coupon discount engine and the client-side coupon cache.

use domain::{CartFingerprint, CartSnapshot, Coupon, CouponCode, Money};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, ValidationError};
use crate::services::CouponService;

/// A coupon the server accepted for a specific order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    /// Server-computed discount, clamped to `validated_against`.
    pub discount: Money,
    /// The order amount the server validated the code against.
    pub validated_against: Money,
}

impl AppliedCoupon {
    /// Returns the coupon code.
    pub fn code(&self) -> &CouponCode {
        &self.coupon.code
    }

    /// Returns `max(0, validated_against - discount)`.
    pub fn final_amount(&self) -> Money {
        self.validated_against.less_discount(self.discount)
    }
}

/// Validates coupon codes against the coupon service.
///
/// Never computes a percentage itself: the discount always comes from the
/// server and is only clamped into `[0, order_amount]`.
pub struct CouponEngine<'a, C: CouponService> {
    service: &'a C,
}

impl<'a, C: CouponService> CouponEngine<'a, C> {
    /// Creates an engine over the given coupon service.
    pub fn new(service: &'a C) -> Self {
        Self { service }
    }

    /// Validates `raw_code` against `order_amount`.
    ///
    /// Blank codes and non-positive amounts are rejected without calling the
    /// service. A code the service does not accept is a
    /// `ValidationError::CouponRejected`.
    #[tracing::instrument(skip(self, order_amount), fields(order_amount = %order_amount))]
    pub async fn validate(
        &self,
        raw_code: &str,
        order_amount: Money,
    ) -> Result<AppliedCoupon, CheckoutError> {
        let code = CouponCode::parse(raw_code).map_err(ValidationError::from)?;
        if !order_amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(order_amount).into());
        }

        let validation = match self.service.validate(&code, order_amount).await {
            Ok(validation) => validation,
            Err(e) => {
                metrics::counter!("coupon_validations_total", "result" => "error").increment(1);
                return Err(CheckoutError::service("validate_coupon")(e));
            }
        };

        match validation.coupon {
            Some(coupon) if validation.valid => {
                metrics::counter!("coupon_validations_total", "result" => "valid").increment(1);
                let discount = order_amount.clamp_discount(validation.discount);
                tracing::info!(code = %code, discount = %discount, "coupon accepted");
                Ok(AppliedCoupon {
                    coupon,
                    discount,
                    validated_against: order_amount,
                })
            }
            _ => {
                metrics::counter!("coupon_validations_total", "result" => "invalid").increment(1);
                let reason = validation
                    .message
                    .unwrap_or_else(|| "Invalid coupon code".to_string());
                tracing::info!(code = %code, %reason, "coupon rejected");
                Err(ValidationError::CouponRejected {
                    code: code.to_string(),
                    reason,
                }
                .into())
            }
        }
    }

    /// Validates against the cart subtotal and records the result in `cache`.
    ///
    /// Any failure clears the cache, so a stale discount never survives a
    /// failed re-validation.
    pub async fn apply(
        &self,
        cache: &mut CouponCache,
        raw_code: &str,
        cart: &CartSnapshot,
    ) -> Result<AppliedCoupon, CheckoutError> {
        match self.validate(raw_code, cart.subtotal()).await {
            Ok(applied) => {
                cache.remember(applied.clone(), cart);
                Ok(applied)
            }
            Err(e) => {
                cache.clear();
                Err(e)
            }
        }
    }
}

/// The last coupon applied in the UI.
///
/// A display hint only. It can be serialized to survive a page reload, but
/// is never used for a monetary computation unless it was validated against
/// the exact cart being priced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCache {
    cached: Option<CachedCoupon>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedCoupon {
    applied: AppliedCoupon,
    cart: CartFingerprint,
}

impl CouponCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a coupon accepted for `cart`.
    pub fn remember(&mut self, applied: AppliedCoupon, cart: &CartSnapshot) {
        self.cached = Some(CachedCoupon {
            applied,
            cart: cart.fingerprint(),
        });
    }

    /// Drops the cached coupon.
    pub fn clear(&mut self) {
        self.cached = None;
    }

    /// Returns the cached coupon, whatever cart it was validated against.
    pub fn applied(&self) -> Option<&AppliedCoupon> {
        self.cached.as_ref().map(|cached| &cached.applied)
    }

    /// Returns true if the cache holds a coupon validated against exactly
    /// this cart.
    pub fn is_current_for(&self, cart: &CartSnapshot) -> bool {
        self.cached.as_ref().is_some_and(|cached| {
            cached.cart == cart.fingerprint() && cached.applied.validated_against == cart.subtotal()
        })
    }

    /// Returns the discount to display for `cart`; zero when stale.
    pub fn discount_for(&self, cart: &CartSnapshot) -> Money {
        match &self.cached {
            Some(cached) if self.is_current_for(cart) => cached.applied.discount,
            _ => Money::zero(),
        }
    }

    /// Returns `max(0, subtotal - discount_for(cart))`.
    pub fn total_for(&self, cart: &CartSnapshot) -> Money {
        cart.subtotal().less_discount(self.discount_for(cart))
    }

    /// Invalidates the cache when the cart contents or total change.
    pub fn on_cart_changed(&mut self, cart: &CartSnapshot) {
        if !self.is_current_for(cart) {
            self.clear();
        }
    }

    /// Invalidates the cache when the user edits the code field.
    pub fn on_code_edited(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::InMemoryCouponService;
    use domain::CartLine;

    fn cart(lines: &[(&str, i64)]) -> CartSnapshot {
        CartSnapshot::new(
            lines
                .iter()
                .map(|(id, price)| CartLine::new(*id, Money::from_minor(*price), "Print"))
                .collect(),
        )
        .unwrap()
    }

    fn service() -> InMemoryCouponService {
        let service = InMemoryCouponService::new();
        service.add_flat("FLAT500", 500);
        service.add_percentage("TENOFF", 10);
        service
    }

    #[tokio::test]
    async fn test_flat_coupon_discount() {
        let service = service();
        let engine = CouponEngine::new(&service);

        let applied = engine
            .validate("FLAT500", Money::from_minor(2499))
            .await
            .unwrap();

        assert_eq!(applied.discount.minor(), 500);
        assert_eq!(applied.final_amount().minor(), 1999);
        assert_eq!(applied.code().as_str(), "FLAT500");
    }

    #[tokio::test]
    async fn test_code_is_trimmed() {
        let service = service();
        let engine = CouponEngine::new(&service);

        let applied = engine
            .validate("  TENOFF ", Money::from_minor(999))
            .await
            .unwrap();
        assert_eq!(applied.discount.minor(), 99);
    }

    #[tokio::test]
    async fn test_discount_never_exceeds_amount() {
        let service = service();
        let engine = CouponEngine::new(&service);

        for amount in [1, 250, 499, 500, 501, 2499] {
            let applied = engine
                .validate("FLAT500", Money::from_minor(amount))
                .await
                .unwrap();
            assert!(applied.discount.minor() >= 0);
            assert!(applied.discount.minor() <= amount);
            assert_eq!(
                applied.final_amount().minor(),
                (amount - applied.discount.minor()).max(0)
            );
        }
    }

    #[tokio::test]
    async fn test_blank_code_makes_no_call() {
        let service = service();
        let engine = CouponEngine::new(&service);

        let result = engine.validate("   ", Money::from_minor(100)).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
        assert_eq!(service.validation_count(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_amount_makes_no_call() {
        let service = service();
        let engine = CouponEngine::new(&service);

        let result = engine.validate("FLAT500", Money::zero()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Validation(
                ValidationError::NonPositiveAmount(_)
            ))
        ));
        assert_eq!(service.validation_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_code_clears_cache() {
        let service = service();
        let engine = CouponEngine::new(&service);
        let cart = cart(&[("1", 2000), ("2", 499)]);
        let mut cache = CouponCache::new();

        engine.apply(&mut cache, "FLAT500", &cart).await.unwrap();
        assert_eq!(cache.total_for(&cart).minor(), 1999);

        let result = engine.apply(&mut cache, "BADCODE", &cart).await;
        match result {
            Err(CheckoutError::Validation(ValidationError::CouponRejected { code, reason })) => {
                assert_eq!(code, "BADCODE");
                assert_eq!(reason, "Invalid coupon code");
            }
            other => panic!("expected CouponRejected, got {other:?}"),
        }
        assert!(cache.applied().is_none());
        assert_eq!(cache.total_for(&cart), cart.subtotal());
    }

    #[tokio::test]
    async fn test_service_error_clears_cache() {
        let service = service();
        let engine = CouponEngine::new(&service);
        let cart = cart(&[("1", 1000)]);
        let mut cache = CouponCache::new();
        engine.apply(&mut cache, "FLAT500", &cart).await.unwrap();

        service.set_unavailable(true);
        let result = engine.apply(&mut cache, "FLAT500", &cart).await;

        assert!(matches!(
            result,
            Err(CheckoutError::Service {
                operation: "validate_coupon",
                source: ServiceError::Unavailable(_),
            })
        ));
        assert!(cache.applied().is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidated_by_total_change() {
        let service = service();
        let engine = CouponEngine::new(&service);
        let cart_before = cart(&[("1", 2000), ("2", 499)]);
        let mut cache = CouponCache::new();
        engine.apply(&mut cache, "FLAT500", &cart_before).await.unwrap();

        cache.on_cart_changed(&cart(&[("1", 2000), ("2", 499)]));
        assert!(cache.is_current_for(&cart_before));

        let cart_after = cart(&[("1", 2000), ("2", 499), ("3", 501)]);
        cache.on_cart_changed(&cart_after);
        assert!(cache.applied().is_none());
        assert_eq!(cache.total_for(&cart_after).minor(), 3000);
    }

    #[tokio::test]
    async fn test_cache_invalidated_by_contents_change_at_same_total() {
        let service = service();
        let engine = CouponEngine::new(&service);
        let mut cache = CouponCache::new();
        engine
            .apply(&mut cache, "FLAT500", &cart(&[("1", 2000), ("2", 499)]))
            .await
            .unwrap();

        let swapped = cart(&[("7", 2000), ("2", 499)]);
        assert_eq!(cache.discount_for(&swapped), Money::zero());

        cache.on_cart_changed(&swapped);
        assert!(cache.applied().is_none());
        assert_eq!(cache.total_for(&swapped).minor(), 2499);
    }

    #[tokio::test]
    async fn test_cache_invalidated_by_code_edit() {
        let service = service();
        let engine = CouponEngine::new(&service);
        let mut cache = CouponCache::new();
        engine
            .apply(&mut cache, "TENOFF", &cart(&[("1", 500)]))
            .await
            .unwrap();

        cache.on_code_edited();
        assert!(cache.applied().is_none());
    }

    #[test]
    fn test_stale_cache_gives_no_discount() {
        let validated = cart(&[("1", 2499)]);
        let mut cache = CouponCache::new();
        cache.remember(
            AppliedCoupon {
                coupon: Coupon {
                    code: CouponCode::parse("FLAT500").unwrap(),
                    discount_type: domain::DiscountType::Flat,
                    discount_amount: 500,
                    coupon_name: "Flat 500".into(),
                },
                discount: Money::from_minor(500),
                validated_against: Money::from_minor(2499),
            },
            &validated,
        );

        assert_eq!(cache.discount_for(&cart(&[("1", 2000)])), Money::zero());
        assert_eq!(cache.total_for(&validated).minor(), 1999);
    }

    #[test]
    fn test_cache_serializes_for_reload() {
        let mut cache = CouponCache::new();
        let cart = cart(&[("1", 2499)]);
        cache.remember(
            AppliedCoupon {
                coupon: Coupon {
                    code: CouponCode::parse("FLAT500").unwrap(),
                    discount_type: domain::DiscountType::Flat,
                    discount_amount: 500,
                    coupon_name: "Flat 500".into(),
                },
                discount: Money::from_minor(500),
                validated_against: cart.subtotal(),
            },
            &cart,
        );

        let json = serde_json::to_string(&cache).unwrap();
        let restored: CouponCache = serde_json::from_str(&json).unwrap();
        assert_eq!(cache, restored);
        assert!(restored.is_current_for(&cart));
    }
}
