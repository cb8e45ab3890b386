//! Checkout saga orchestrator.

use common::{SessionId, UserId};
use domain::{
    Aggregate, CaptureOutcome, CaptureRecord, CartSnapshot, CouponCode, IdempotencyKey, Money,
    OrderId, OrderStatus, ProductId,
};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::coupon::CouponEngine;
use crate::entitlement::FreeEntitlementResolver;
use crate::error::{CheckoutError, ValidationError};
use crate::events::{CheckoutEvent, PurchaseRoute};
use crate::guard::CheckoutGuard;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::services::{
    CacheScope, CaptureRequest, CaptureService, CouponService, CreateOrderRequest,
    CreatePaymentOrderRequest, EntitlementService, FreePurchaseMethod, FreePurchaseRequest,
    GatewayCheckout, GatewayCheckoutRequest, GatewayCheckoutResult, InMemoryCaptureService,
    InMemoryCouponService, InMemoryEntitlementService, InMemoryOrderService,
    InMemoryPaymentGatewayService, Notice, OrderService, PaymentGatewayService, RecordingUi,
    ScriptedGatewayCheckout, StorefrontUi, normalize_capture,
};
use crate::session::CheckoutSession;
use crate::state::CheckoutState;

/// What the UI submits to start a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// None when nobody is signed in.
    pub user_id: Option<UserId>,
    pub cart: CartSnapshot,
    /// The code as typed; blank means no coupon.
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    /// Creates a request for a signed-in user without a coupon.
    pub fn new(user_id: UserId, cart: CartSnapshot) -> Self {
        Self {
            user_id: Some(user_id),
            cart,
            coupon_code: None,
        }
    }

    /// Adds a coupon code.
    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }
}

/// How a checkout ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The order is placed and, on the paid route, the payment confirmed.
    Succeeded {
        order_id: OrderId,
        route: PurchaseRoute,
    },
    /// Capture timed out and the order could not be confirmed as paid.
    /// The shopper is sent to their orders instead of being asked to pay again.
    Unresolved { order_id: OrderId },
    /// No confirmed order. Anything created server-side stays pending.
    Failed { error: CheckoutError },
}

impl CheckoutOutcome {
    /// Returns true for `Succeeded`.
    pub fn is_success(&self) -> bool {
        matches!(self, CheckoutOutcome::Succeeded { .. })
    }

    /// Returns the order id, if an order is known.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            CheckoutOutcome::Succeeded { order_id, .. }
            | CheckoutOutcome::Unresolved { order_id } => Some(order_id),
            CheckoutOutcome::Failed { .. } => None,
        }
    }
}

/// Everything one checkout attempt produced.
#[derive(Debug, Clone)]
pub struct CheckoutReport {
    /// The session folded from `events`; equal to `CheckoutSession::replay(events)`.
    pub session: CheckoutSession,
    /// The session journal, in order.
    pub events: Vec<CheckoutEvent>,
    pub outcome: CheckoutOutcome,
}

/// The collaborators a checkout calls.
pub struct CheckoutServices<O, P, G, C, Cp, E, U> {
    pub orders: O,
    pub gateway: P,
    pub gateway_checkout: G,
    pub capture: C,
    pub coupons: Cp,
    pub entitlements: E,
    pub ui: U,
}

/// In-memory collaborators wired to each other.
pub type InMemoryCheckoutServices = CheckoutServices<
    InMemoryOrderService,
    InMemoryPaymentGatewayService,
    ScriptedGatewayCheckout,
    InMemoryCaptureService,
    InMemoryCouponService,
    InMemoryEntitlementService,
    RecordingUi,
>;

impl InMemoryCheckoutServices {
    /// Creates in-memory services; capture settles orders in the order store.
    pub fn in_memory() -> Self {
        Self::with_gateway_checkout(ScriptedGatewayCheckout::new())
    }

    /// Creates in-memory services around a given gateway checkout script.
    pub fn with_gateway_checkout(gateway_checkout: ScriptedGatewayCheckout) -> Self {
        let orders = InMemoryOrderService::new();
        let gateway = InMemoryPaymentGatewayService::new();
        let capture = InMemoryCaptureService::new(gateway.clone(), orders.clone());
        Self {
            orders,
            gateway,
            gateway_checkout,
            capture,
            coupons: InMemoryCouponService::new(),
            entitlements: InMemoryEntitlementService::new(),
            ui: RecordingUi::new(),
        }
    }
}

/// Orchestrator over the in-memory services.
pub type InMemoryCheckoutOrchestrator = CheckoutOrchestrator<
    InMemoryOrderService,
    InMemoryPaymentGatewayService,
    ScriptedGatewayCheckout,
    InMemoryCaptureService,
    InMemoryCouponService,
    InMemoryEntitlementService,
    RecordingUi,
>;

/// Drives a checkout from cart to confirmed order.
///
/// The saga is an explicit state machine: one loop reads the session state,
/// runs the step for it, and folds the events the step produced back into the
/// session. A step that fails ends the saga with `CheckoutFailed`. Nothing is
/// rolled back: an order created before a failure stays pending server-side.
pub struct CheckoutOrchestrator<O, P, G, C, Cp, E, U>
where
    O: OrderService,
    P: PaymentGatewayService,
    G: GatewayCheckout,
    C: CaptureService,
    Cp: CouponService,
    E: EntitlementService,
    U: StorefrontUi,
{
    config: GatewayConfig,
    services: CheckoutServices<O, P, G, C, Cp, E, U>,
    guard: CheckoutGuard,
}

impl<O, P, G, C, Cp, E, U> CheckoutOrchestrator<O, P, G, C, Cp, E, U>
where
    O: OrderService,
    P: PaymentGatewayService,
    G: GatewayCheckout,
    C: CaptureService,
    Cp: CouponService,
    E: EntitlementService,
    U: StorefrontUi,
{
    /// Creates a new orchestrator.
    pub fn new(config: GatewayConfig, services: CheckoutServices<O, P, G, C, Cp, E, U>) -> Self {
        Self {
            config,
            services,
            guard: CheckoutGuard::new(),
        }
    }

    /// Returns the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the collaborators.
    pub fn services(&self) -> &CheckoutServices<O, P, G, C, Cp, E, U> {
        &self.services
    }

    /// Returns the orchestrator's own in-progress guard.
    pub fn guard(&self) -> &CheckoutGuard {
        &self.guard
    }

    /// Returns a coupon engine over the coupon service.
    pub fn coupon_engine(&self) -> CouponEngine<'_, Cp> {
        CouponEngine::new(&self.services.coupons)
    }

    /// Returns a reconciler over the order service.
    pub fn reconciler(&self) -> Reconciler<'_, O> {
        Reconciler::new(&self.services.orders)
    }

    /// Runs a checkout under the orchestrator's own guard.
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutReport, CheckoutError> {
        self.checkout_with_guard(&self.guard, request).await
    }

    /// Runs a checkout under `guard`.
    ///
    /// Returns `AlreadyInProgress` without touching any service if the guard
    /// is held. Every other ending, including failures, is reported in the
    /// `CheckoutReport`.
    pub async fn checkout_with_guard(
        &self,
        guard: &CheckoutGuard,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReport, CheckoutError> {
        let Some(_token) = guard.try_acquire() else {
            metrics::counter!("checkout_rejected_in_progress_total").increment(1);
            tracing::info!("checkout already in progress, ignoring request");
            return Err(CheckoutError::AlreadyInProgress);
        };

        Ok(self.run(request).await)
    }

    #[tracing::instrument(skip(self, request), fields(user_id = ?request.user_id, subtotal = %request.cart.subtotal()))]
    async fn run(&self, request: &CheckoutRequest) -> CheckoutReport {
        metrics::counter!("checkout_started_total").increment(1);
        let started = std::time::Instant::now();

        let mut session = CheckoutSession::default();
        let mut journal = Vec::new();
        let mut failure = None;

        let opened = CheckoutEvent::checkout_started(
            SessionId::new(),
            request.user_id,
            request.cart.subtotal(),
            request.cart.line_count(),
        );
        if let Err(error) = record(&mut session, &mut journal, opened) {
            failure = Some(error);
        }

        while !session.state().is_terminal() && failure.is_none() {
            let from = session.state();
            let mut events = Vec::new();

            let step = match from {
                CheckoutState::Validating => self.validate(request, &mut events).await,
                CheckoutState::OrderCreated => self.create_gateway_order(&session, &mut events).await,
                CheckoutState::GatewayOrderCreated => self.open_gateway(&session, &mut events),
                CheckoutState::AwaitingGateway => self.await_gateway(&session, &mut events).await,
                CheckoutState::Capturing => self.capture(&session, &mut events).await,
                CheckoutState::Reconciling => self.reconcile(&session, &mut events).await,
                CheckoutState::Idle | CheckoutState::Succeeded | CheckoutState::Failed => {
                    Err(state_error(format!("no step runs in {from}")))
                }
            };

            let applied = events
                .into_iter()
                .try_for_each(|event| record(&mut session, &mut journal, event));

            let result = applied.and(step).and_then(|()| {
                if session.state() == from {
                    Err(state_error(format!("step made no progress in {from}")))
                } else {
                    Ok(())
                }
            });

            if let Err(error) = result {
                tracing::warn!(state = %from, kind = error.kind(), error = %error, "checkout step failed");
                if !session.state().is_terminal() {
                    let event = CheckoutEvent::checkout_failed(error.kind(), error.to_string());
                    session.apply(event.clone());
                    journal.push(event);
                }
                failure = Some(error);
            }
        }

        let outcome = match journal.last() {
            Some(CheckoutEvent::CheckoutSucceeded(data)) => CheckoutOutcome::Succeeded {
                order_id: data.order_id.clone(),
                route: data.route,
            },
            Some(CheckoutEvent::CheckoutUnresolved(data)) => CheckoutOutcome::Unresolved {
                order_id: data.order_id.clone(),
            },
            _ => CheckoutOutcome::Failed {
                error: failure
                    .unwrap_or_else(|| state_error("checkout ended without a cause".to_string())),
            },
        };

        self.finish(&outcome);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        CheckoutReport {
            session,
            events: journal,
            outcome,
        }
    }

    /// Local checks, entitlement and pricing, then order creation.
    async fn validate(
        &self,
        request: &CheckoutRequest,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        let cart = &request.cart;
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let user_id = request.user_id.ok_or(ValidationError::Unauthenticated)?;
        let product_ids = cart.product_ids().map_err(ValidationError::from)?;
        let idempotency_key = IdempotencyKey::for_cart(user_id, cart);
        events.push(CheckoutEvent::cart_validated(
            product_ids.clone(),
            idempotency_key.clone(),
        ));

        let entitlement = FreeEntitlementResolver::new(&self.services.entitlements)
            .resolve(user_id, cart)
            .await?;
        events.push(CheckoutEvent::entitlement_resolved(
            entitlement.free,
            entitlement.reason,
        ));
        if entitlement.free {
            return self
                .free_purchase(
                    FreePurchaseMethod::Subscription,
                    None,
                    product_ids,
                    idempotency_key.priced(None, Money::zero()),
                    events,
                )
                .await;
        }

        let subtotal = cart.subtotal();
        let (coupon_code, discount) = self.price(request.coupon_code.as_deref(), subtotal).await?;
        let final_amount = subtotal.less_discount(discount);
        events.push(CheckoutEvent::pricing_resolved(
            coupon_code.clone(),
            discount,
            final_amount,
        ));
        let order_key = idempotency_key.priced(coupon_code.as_ref(), final_amount);

        if final_amount.is_zero() {
            if coupon_code.is_none() {
                return Err(ValidationError::NonPositiveAmount(final_amount).into());
            }
            return self
                .free_purchase(
                    FreePurchaseMethod::Coupon,
                    coupon_code,
                    product_ids,
                    order_key,
                    events,
                )
                .await;
        }

        // No server-side order before the gateway is known to be usable.
        self.config.require_merchant_key()?;

        let receipt = self
            .services
            .orders
            .create_order(CreateOrderRequest {
                product_ids,
                final_amount,
                coupon_code,
                idempotency_key: order_key,
            })
            .await
            .map_err(CheckoutError::service("create_order"))?;
        let order_id = receipt.order_id.ok_or(CheckoutError::MissingOrderId)?;
        // A repeat submission may only resume an order that is still unpaid.
        if let Some(status) = receipt.status.filter(|s| *s != OrderStatus::Pending) {
            return Err(CheckoutError::Integrity {
                stage: "create_order",
                detail: format!("order {order_id} is already {status}"),
            });
        }
        tracing::info!(order_id = %order_id, amount = %final_amount, "order created");
        events.push(CheckoutEvent::order_created(order_id, receipt.total_amount));

        match receipt.total_amount {
            Some(recorded) if recorded != final_amount => Err(CheckoutError::amount_mismatch(
                "create_order",
                final_amount,
                recorded,
            )),
            _ => Ok(()),
        }
    }

    /// Re-validates the coupon against the subtotal being charged.
    ///
    /// A code the server no longer accepts is dropped and the undiscounted
    /// subtotal is charged; a coupon service failure ends the checkout.
    async fn price(
        &self,
        raw_code: Option<&str>,
        subtotal: Money,
    ) -> Result<(Option<CouponCode>, Money), CheckoutError> {
        let Some(raw_code) = raw_code.filter(|code| !code.trim().is_empty()) else {
            return Ok((None, Money::zero()));
        };

        match self.coupon_engine().validate(raw_code, subtotal).await {
            Ok(applied) => Ok((Some(applied.coupon.code), applied.discount)),
            Err(CheckoutError::Validation(reason)) => {
                tracing::warn!(%reason, "coupon dropped, charging the undiscounted subtotal");
                Ok((None, Money::zero()))
            }
            Err(e) => Err(e),
        }
    }

    /// Creates a settled zero-amount order; ends the saga on success.
    async fn free_purchase(
        &self,
        method: FreePurchaseMethod,
        coupon_code: Option<CouponCode>,
        product_ids: Vec<ProductId>,
        idempotency_key: IdempotencyKey,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        let receipt = self
            .services
            .orders
            .create_free_purchase(FreePurchaseRequest {
                payment_method: method,
                coupon_code,
                product_ids,
                idempotency_key,
            })
            .await
            .map_err(CheckoutError::service("create_free_purchase"))?;
        let order_id = receipt.order_id.ok_or(CheckoutError::MissingOrderId)?;

        if let Some(recorded) = receipt.total_amount {
            if !recorded.is_zero() {
                return Err(CheckoutError::amount_mismatch(
                    "create_free_purchase",
                    Money::zero(),
                    recorded,
                ));
            }
        }

        tracing::info!(order_id = %order_id, method = method.as_str(), "free purchase created");
        events.push(CheckoutEvent::free_purchase_created(order_id.clone(), method));
        events.push(CheckoutEvent::checkout_succeeded(order_id, method.into()));
        Ok(())
    }

    async fn create_gateway_order(
        &self,
        session: &CheckoutSession,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        self.config.require_merchant_key()?;
        let order_id = session.order_id().cloned().ok_or(CheckoutError::MissingOrderId)?;
        let amount = session.final_amount();

        let payment_order = self
            .services
            .gateway
            .create_payment_order(CreatePaymentOrderRequest {
                amount,
                currency: self.config.currency,
                order_id,
                description: self.config.description.clone(),
            })
            .await
            .map_err(CheckoutError::service("create_payment_order"))?;

        tracing::info!(
            gateway_order_id = %payment_order.gateway_order_id,
            payment_record_id = %payment_order.payment_record_id,
            "gateway order created"
        );
        events.push(CheckoutEvent::gateway_order_created(
            payment_order.gateway_order_id,
            payment_order.payment_record_id,
            payment_order.amount,
        ));

        if payment_order.amount != amount {
            return Err(CheckoutError::amount_mismatch(
                "create_payment_order",
                amount,
                payment_order.amount,
            ));
        }
        Ok(())
    }

    fn open_gateway(
        &self,
        session: &CheckoutSession,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        self.config.require_merchant_key()?;
        let subunits = session
            .final_amount()
            .to_gateway_subunits(self.config.currency)
            .map_err(|e| CheckoutError::Integrity {
                stage: "open_gateway",
                detail: e.to_string(),
            })?;
        events.push(CheckoutEvent::gateway_opened(subunits));
        Ok(())
    }

    /// Hands off to the gateway sheet and waits for the shopper.
    async fn await_gateway(
        &self,
        session: &CheckoutSession,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        let merchant_key = self.config.require_merchant_key()?.to_string();
        let request = GatewayCheckoutRequest {
            gateway_order_id: required(session.gateway_order_id(), "gateway order id")?.to_string(),
            amount_subunits: required(session.gateway_amount_subunits(), "gateway amount")?,
            currency: self.config.currency,
            merchant_key,
            theme_color: self.config.theme_color.clone(),
            description: self.config.description.clone(),
            order_id: session.order_id().cloned().ok_or(CheckoutError::MissingOrderId)?,
        };

        match self.services.gateway_checkout.collect_payment(request).await {
            GatewayCheckoutResult::Completed { gateway_payment_id } => {
                events.push(CheckoutEvent::gateway_payment_completed(gateway_payment_id));
                Ok(())
            }
            GatewayCheckoutResult::Dismissed => {
                Err(CheckoutError::PaymentFailed("Payment was cancelled".to_string()))
            }
            GatewayCheckoutResult::Rejected { reason } => Err(CheckoutError::PaymentFailed(reason)),
        }
    }

    async fn capture(
        &self,
        session: &CheckoutSession,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        let order_id = session.order_id().cloned().ok_or(CheckoutError::MissingOrderId)?;
        let request = CaptureRequest {
            payment_record_id: required(session.payment_record_id(), "payment record id")?
                .to_string(),
            gateway_payment_id: required(session.gateway_payment_id(), "gateway payment id")?
                .to_string(),
            amount: session.final_amount(),
        };

        let result = normalize_capture(self.services.capture.capture(request.clone()).await);
        let outcome = result.as_ref().copied().unwrap_or(CaptureOutcome::Failed);

        events.push(CheckoutEvent::capture_recorded(CaptureRecord {
            payment_record_id: request.payment_record_id,
            gateway_payment_id: request.gateway_payment_id,
            amount: request.amount,
            outcome,
        }));
        if let Err(e) = result {
            return Err(CheckoutError::PaymentFailed(e.to_string()));
        }

        if outcome.is_settled() {
            tracing::info!(outcome = outcome.as_str(), "payment captured");
            events.push(CheckoutEvent::checkout_succeeded(order_id, PurchaseRoute::Paid));
        } else {
            let ambiguous = CheckoutError::CaptureAmbiguous { order_id };
            tracing::warn!(error = %ambiguous, "reconciling");
        }
        Ok(())
    }

    async fn reconcile(
        &self,
        session: &CheckoutSession,
        events: &mut Vec<CheckoutEvent>,
    ) -> Result<(), CheckoutError> {
        let order_id = session.order_id().cloned().ok_or(CheckoutError::MissingOrderId)?;
        let result = self.reconciler().reconcile(&order_id).await;

        events.push(CheckoutEvent::reconciled(result.order_status()));
        events.push(match result {
            Reconciliation::Succeeded => {
                CheckoutEvent::checkout_succeeded(order_id, PurchaseRoute::Paid)
            }
            Reconciliation::Unresolved { .. } => CheckoutEvent::checkout_unresolved(order_id),
        });
        Ok(())
    }

    /// Shows exactly one notice and drops stale caches.
    fn finish(&self, outcome: &CheckoutOutcome) {
        let ui = &self.services.ui;
        match outcome {
            CheckoutOutcome::Succeeded { order_id, route } => {
                metrics::counter!("checkout_succeeded_total", "route" => route.as_str())
                    .increment(1);
                tracing::info!(order_id = %order_id, route = route.as_str(), "checkout succeeded");
                ui.invalidate(CacheScope::Cart);
                ui.invalidate(CacheScope::Orders);
                ui.notify(Notice::OrderPlaced {
                    order_id: order_id.clone(),
                });
            }
            CheckoutOutcome::Unresolved { order_id } => {
                metrics::counter!("checkout_unresolved_total").increment(1);
                let error = CheckoutError::UnresolvedPayment {
                    order_id: order_id.clone(),
                };
                tracing::warn!(order_id = %order_id, "checkout unresolved, payment not confirmed");
                ui.invalidate(CacheScope::Orders);
                ui.notify(Notice::VerifyInOrders {
                    order_id: order_id.clone(),
                    message: error.user_message(),
                });
            }
            CheckoutOutcome::Failed { error } => {
                metrics::counter!("checkout_failed_total", "kind" => error.kind()).increment(1);
                tracing::warn!(kind = error.kind(), error = %error, "checkout failed");
                ui.notify(Notice::CheckoutFailed {
                    message: error.user_message(),
                });
            }
        }
    }
}

/// Applies `event` to the session and appends it to the journal, refusing
/// transitions the state machine does not allow.
fn record(
    session: &mut CheckoutSession,
    journal: &mut Vec<CheckoutEvent>,
    event: CheckoutEvent,
) -> Result<(), CheckoutError> {
    if let Some(next) = event.target_state() {
        let from = session.state();
        if !from.can_transition_to(next) {
            return Err(state_error(format!("illegal transition {from} -> {next}")));
        }
        tracing::debug!(%from, to = %next, "checkout transition");
    }
    session.apply(event.clone());
    journal.push(event);
    Ok(())
}

fn required<T>(value: Option<T>, what: &str) -> Result<T, CheckoutError> {
    value.ok_or_else(|| state_error(format!("session has no {what}")))
}

fn state_error(detail: String) -> CheckoutError {
    CheckoutError::Integrity {
        stage: "state_machine",
        detail,
    }
}
