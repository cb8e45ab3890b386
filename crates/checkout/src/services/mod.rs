//! External service traits and in-memory implementations for checkout steps.

pub mod capture;
pub mod coupons;
pub mod entitlements;
pub mod gateway;
pub mod gateway_checkout;
pub mod orders;
pub mod ui;

pub use capture::{
    CaptureBehavior, CaptureRequest, CaptureService, InMemoryCaptureService, normalize_capture,
};
pub use coupons::{CouponRule, CouponService, InMemoryCouponService};
pub use entitlements::{EntitlementService, EntitlementStatus, InMemoryEntitlementService};
pub use gateway::{CreatePaymentOrderRequest, InMemoryPaymentGatewayService, PaymentGatewayService};
pub use gateway_checkout::{
    GatewayCheckout, GatewayCheckoutRequest, GatewayCheckoutResult, ScriptedGatewayCheckout,
    ShopperAction,
};
pub use orders::{
    CreateOrderRequest, FreePurchaseMethod, FreePurchaseRequest, InMemoryOrderService,
    OrderReceipt, OrderService,
};
pub use ui::{CacheScope, Notice, RecordingUi, StorefrontUi};
