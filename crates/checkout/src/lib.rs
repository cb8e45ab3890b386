//! Checkout transaction orchestration.
//!
//! Turns a cart snapshot into a confirmed order:
//! 1. Validate the cart and the user, resolve free entitlements, price coupons
//! 2. Create the order
//! 3. Create the gateway payment order
//! 4. Hand off to the gateway checkout and wait for the shopper
//! 5. Capture the payment
//! 6. Reconcile against the order when capture times out
//!
//! Nothing is compensated. Once an order exists the orchestrator only reports
//! its status; pending orders are resolved server-side.

pub mod config;
pub mod coordinator;
pub mod coupon;
pub mod entitlement;
pub mod error;
pub mod events;
pub mod guard;
pub mod reconcile;
pub mod services;
pub mod session;
pub mod state;

pub use config::GatewayConfig;
pub use coordinator::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutReport, CheckoutRequest, CheckoutServices,
    InMemoryCheckoutOrchestrator, InMemoryCheckoutServices,
};
pub use coupon::{AppliedCoupon, CouponCache, CouponEngine};
pub use entitlement::{Entitlement, FreeEntitlementResolver};
pub use error::{CheckoutError, ServiceError, ValidationError};
pub use events::{CheckoutEvent, PurchaseRoute};
pub use guard::{CheckoutGuard, GuardToken};
pub use reconcile::{Reconciler, Reconciliation};
pub use services::{
    CacheScope, CaptureBehavior, CaptureService, CouponRule, CouponService, EntitlementService,
    FreePurchaseMethod, GatewayCheckout, InMemoryCaptureService, InMemoryCouponService,
    InMemoryEntitlementService, InMemoryOrderService, InMemoryPaymentGatewayService, Notice,
    OrderService, PaymentGatewayService, RecordingUi, ScriptedGatewayCheckout, ShopperAction,
    StorefrontUi,
};
pub use session::{CheckoutSession, FailureRecord};
pub use state::CheckoutState;
