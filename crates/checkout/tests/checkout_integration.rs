//! Integration tests for the checkout saga.

use std::sync::Arc;

use checkout::{
    CacheScope, CaptureBehavior, CheckoutError, CheckoutEvent, CheckoutOrchestrator,
    CheckoutOutcome, CheckoutReport, CheckoutRequest, CheckoutServices, CheckoutSession,
    CheckoutState, FreePurchaseMethod, GatewayConfig, InMemoryCheckoutOrchestrator,
    InMemoryCheckoutServices, Notice, PurchaseRoute, ScriptedGatewayCheckout, ShopperAction,
    ValidationError,
};
use common::UserId;
use domain::{Aggregate, CartLine, CartSnapshot, Currency, Money, OrderStatus};
use tokio::sync::Notify;

struct TestHarness {
    orchestrator: InMemoryCheckoutOrchestrator,
    user: UserId,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(GatewayConfig::new("rzp_test_key"))
    }

    fn with_config(config: GatewayConfig) -> Self {
        Self {
            orchestrator: CheckoutOrchestrator::new(config, CheckoutServices::in_memory()),
            user: UserId::new(),
        }
    }

    fn services(&self) -> &InMemoryCheckoutServices {
        self.orchestrator.services()
    }

    fn request(&self, subtotal: i64) -> CheckoutRequest {
        CheckoutRequest::new(self.user, cart(subtotal))
    }

    async fn checkout(&self, request: &CheckoutRequest) -> CheckoutReport {
        self.orchestrator.checkout(request).await.unwrap()
    }
}

/// Two lines summing to `subtotal`.
fn cart(subtotal: i64) -> CartSnapshot {
    CartSnapshot::new(vec![
        CartLine::new("501", Money::from_minor(subtotal - 499), "Sunset poster"),
        CartLine::new("502", Money::from_minor(499), "Sticker sheet"),
    ])
    .unwrap()
}

fn count_succeeded(report: &CheckoutReport) -> usize {
    report
        .events
        .iter()
        .filter(|event| matches!(event, CheckoutEvent::CheckoutSucceeded(_)))
        .count()
}

#[tokio::test]
async fn test_flat_coupon_paid_checkout() {
    let h = TestHarness::new();
    h.services().coupons.add_flat("FLAT500", 500);

    let report = h.checkout(&h.request(2499).with_coupon("FLAT500")).await;

    let order_id = match &report.outcome {
        CheckoutOutcome::Succeeded { order_id, route } => {
            assert_eq!(*route, PurchaseRoute::Paid);
            order_id.clone()
        }
        other => panic!("expected success, got {other:?}"),
    };

    let created = h.services().orders.last_create_request().unwrap();
    assert_eq!(created.final_amount.minor(), 1999);
    assert_eq!(created.coupon_code.unwrap().as_str(), "FLAT500");
    assert_eq!(created.product_ids.len(), 2);

    let sheets = h.services().gateway_checkout.requests();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].amount_subunits, 199_900);
    assert_eq!(sheets[0].currency, Currency::Inr);
    assert_eq!(sheets[0].merchant_key, "rzp_test_key");
    assert_eq!(sheets[0].order_id, order_id);

    assert_eq!(report.session.discount().minor(), 500);
    assert_eq!(report.session.final_amount().minor(), 1999);
    assert_eq!(report.session.state(), CheckoutState::Succeeded);
    assert_eq!(
        h.services().orders.order(&order_id).unwrap().status,
        OrderStatus::Success
    );
    assert_eq!(h.services().capture.captured_count(), 1);
    assert_eq!(h.services().ui.notices(), vec![Notice::OrderPlaced { order_id }]);
    assert_eq!(
        h.services().ui.invalidations(),
        vec![CacheScope::Cart, CacheScope::Orders]
    );
}

#[tokio::test]
async fn test_entitled_user_skips_payment() {
    let h = TestHarness::new();
    h.services().entitlements.grant_plan(h.user, "Studio");

    let report = h.checkout(&h.request(5000)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Succeeded {
            route: PurchaseRoute::Entitlement,
            ..
        }
    ));
    let free = h.services().orders.last_free_purchase_request().unwrap();
    assert_eq!(free.payment_method, FreePurchaseMethod::Subscription);

    let order_id = report.outcome.order_id().unwrap();
    let order = h.services().orders.order(order_id).unwrap();
    assert!(order.total_amount.is_zero());
    assert_eq!(order.status, OrderStatus::Success);

    assert!(report.session.final_amount().is_zero());
    assert_eq!(h.services().orders.create_calls(), 0);
    assert_eq!(h.services().gateway.payment_order_count(), 0);
    assert_eq!(h.services().gateway_checkout.open_count(), 0);
    assert_eq!(h.services().capture.call_count(), 0);
}

#[tokio::test]
async fn test_entitlement_checked_every_attempt() {
    let h = TestHarness::new();
    h.services().entitlements.grant_plan(h.user, "Studio");
    h.checkout(&h.request(5000)).await;

    h.services().entitlements.revoke_plan(h.user);
    let report = h.checkout(&h.request(5000)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Succeeded {
            route: PurchaseRoute::Paid,
            ..
        }
    ));
    assert_eq!(h.services().entitlements.check_count(), 2);
}

#[tokio::test]
async fn test_already_captured_skips_reconciliation() {
    let h = TestHarness::new();
    let request = h.request(2499);
    h.services()
        .capture
        .set_behavior(CaptureBehavior::Reject("payment already captured".to_string()));

    let report = h.checkout(&request).await;

    assert!(report.outcome.is_success());
    assert_eq!(
        report.session.capture().unwrap().outcome,
        domain::CaptureOutcome::AlreadyCaptured
    );
    assert_eq!(h.services().orders.detail_calls(), 0);
    assert!(
        !report
            .events
            .iter()
            .any(|event| matches!(event, CheckoutEvent::Reconciled(_)))
    );
}

#[tokio::test]
async fn test_timeout_then_paid_order_succeeds_once() {
    let h = TestHarness::new();
    h.services()
        .capture
        .set_behavior(CaptureBehavior::SettleThenTimeout);

    let report = h.checkout(&h.request(2499)).await;

    assert!(report.outcome.is_success());
    assert_eq!(count_succeeded(&report), 1);
    assert_eq!(h.services().orders.create_calls(), 1);
    assert_eq!(h.services().gateway.payment_order_count(), 1);
    assert_eq!(h.services().capture.call_count(), 1);
    assert_eq!(h.services().orders.detail_calls(), 1);
    assert_eq!(h.services().ui.notices().len(), 1);

    let states: Vec<CheckoutState> = report
        .events
        .iter()
        .filter_map(CheckoutEvent::target_state)
        .collect();
    assert_eq!(
        &states[states.len() - 2..],
        &[CheckoutState::Reconciling, CheckoutState::Succeeded]
    );
}

#[tokio::test]
async fn test_timeout_with_pending_order_is_unresolved() {
    let h = TestHarness::new();
    h.services().capture.set_behavior(CaptureBehavior::Timeout);

    let report = h.checkout(&h.request(2499)).await;

    let order_id = match &report.outcome {
        CheckoutOutcome::Unresolved { order_id } => order_id.clone(),
        other => panic!("expected unresolved, got {other:?}"),
    };
    assert_eq!(report.session.state(), CheckoutState::Failed);
    assert!(report.session.is_unresolved());
    assert!(report.session.failure().is_none());
    assert_eq!(
        h.services().orders.order(&order_id).unwrap().status,
        OrderStatus::Pending
    );

    match h.services().ui.notices().as_slice() {
        [Notice::VerifyInOrders { order_id: shown, message }] => {
            assert_eq!(shown, &order_id);
            assert!(message.contains("check your orders"));
        }
        other => panic!("expected a single verify notice, got {other:?}"),
    }
    assert_eq!(h.services().ui.invalidations(), vec![CacheScope::Orders]);
}

#[tokio::test]
async fn test_unreadable_order_after_timeout_is_unresolved() {
    let h = TestHarness::new();
    h.services().capture.set_behavior(CaptureBehavior::Timeout);
    h.services().orders.set_detail_unavailable(true);

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(report.outcome, CheckoutOutcome::Unresolved { .. }));
}

#[tokio::test]
async fn test_bad_coupon_charges_full_subtotal() {
    let h = TestHarness::new();
    h.services().coupons.add_flat("FLAT500", 500);

    let report = h.checkout(&h.request(2499).with_coupon("BADCODE")).await;

    assert!(report.outcome.is_success());
    let created = h.services().orders.last_create_request().unwrap();
    assert_eq!(created.final_amount.minor(), 2499);
    assert!(created.coupon_code.is_none());
    assert!(report.session.coupon_code().is_none());
    assert_eq!(report.session.discount(), Money::zero());
    assert_eq!(
        h.services().gateway_checkout.requests()[0].amount_subunits,
        249_900
    );
}

#[tokio::test]
async fn test_coupon_covering_total_uses_free_purchase() {
    let h = TestHarness::new();
    h.services().coupons.add_flat("FREEBIE", 10_000);

    let report = h.checkout(&h.request(2499).with_coupon("FREEBIE")).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Succeeded {
            route: PurchaseRoute::ZeroTotal,
            ..
        }
    ));
    let free = h.services().orders.last_free_purchase_request().unwrap();
    assert_eq!(free.payment_method, FreePurchaseMethod::Coupon);
    assert_eq!(free.coupon_code.unwrap().as_str(), "FREEBIE");
    assert_eq!(h.services().gateway.payment_order_count(), 0);
    assert_eq!(h.services().capture.call_count(), 0);
}

#[tokio::test]
async fn test_coupon_service_down_fails_before_order() {
    let h = TestHarness::new();
    h.services().coupons.set_unavailable(true);

    let report = h.checkout(&h.request(2499).with_coupon("FLAT500")).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Service {
                operation: "validate_coupon",
                ..
            }
        }
    ));
    assert_eq!(h.services().orders.create_calls(), 0);
}

#[tokio::test]
async fn test_missing_merchant_key_creates_no_order() {
    let h = TestHarness::with_config(GatewayConfig::default());

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::GatewayConfig(_)
        }
    ));
    assert_eq!(h.services().orders.create_calls(), 0);
    assert_eq!(h.services().gateway_checkout.open_count(), 0);
}

#[tokio::test]
async fn test_blank_merchant_key_is_missing_config() {
    let h = TestHarness::with_config(GatewayConfig::new("   "));

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::GatewayConfig(_)
        }
    ));
}

#[tokio::test]
async fn test_free_purchase_needs_no_merchant_key() {
    let h = TestHarness::with_config(GatewayConfig::default());
    h.services().entitlements.grant_plan(h.user, "Studio");

    let report = h.checkout(&h.request(5000)).await;

    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_missing_order_id_is_fatal() {
    let h = TestHarness::new();
    h.services().orders.set_omit_order_id(true);

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::MissingOrderId
        }
    ));
    assert_eq!(h.services().orders.create_calls(), 1);
    assert_eq!(h.services().gateway.payment_order_count(), 0);
}

#[tokio::test]
async fn test_gateway_amount_mismatch_is_integrity_error() {
    let h = TestHarness::new();
    h.services()
        .gateway
        .set_amount_override(Some(Money::from_minor(1500)));

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Integrity {
                stage: "create_payment_order",
                ..
            }
        }
    ));
    assert_eq!(h.services().gateway_checkout.open_count(), 0);
    assert_eq!(h.services().capture.call_count(), 0);
}

#[tokio::test]
async fn test_recorded_order_amount_mismatch_is_integrity_error() {
    let h = TestHarness::new();
    h.services()
        .orders
        .set_recorded_amount_override(Some(Money::from_minor(100)));

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Integrity {
                stage: "create_order",
                ..
            }
        }
    ));
    assert_eq!(h.services().gateway.payment_order_count(), 0);
}

#[tokio::test]
async fn test_dismissed_sheet_leaves_order_pending() {
    let h = TestHarness::new();
    h.services()
        .gateway_checkout
        .set_action(ShopperAction::Dismiss);

    let report = h.checkout(&h.request(2499)).await;

    match &report.outcome {
        CheckoutOutcome::Failed {
            error: CheckoutError::PaymentFailed(reason),
        } => assert_eq!(reason, "Payment was cancelled"),
        other => panic!("expected PaymentFailed, got {other:?}"),
    }
    assert_eq!(h.services().capture.call_count(), 0);
    let order_id = report.session.order_id().unwrap();
    assert_eq!(
        h.services().orders.order(order_id).unwrap().status,
        OrderStatus::Pending
    );
    assert!(h.services().ui.invalidations().is_empty());
    assert!(matches!(
        h.services().ui.notices().as_slice(),
        [Notice::CheckoutFailed { .. }]
    ));
}

#[tokio::test]
async fn test_retry_after_dismiss_reuses_pending_order() {
    let h = TestHarness::new();
    let request = h.request(2499);
    h.services()
        .gateway_checkout
        .set_action(ShopperAction::Dismiss);
    let first = h.checkout(&request).await;

    h.services().gateway_checkout.set_action(ShopperAction::Pay);
    let second = h.checkout(&request).await;

    assert!(second.outcome.is_success());
    assert_eq!(first.session.order_id(), second.outcome.order_id());
    assert_eq!(h.services().orders.order_count(), 1);
    assert_eq!(
        first.session.idempotency_key(),
        second.session.idempotency_key()
    );
}

#[tokio::test]
async fn test_retry_with_coupon_after_dismiss_reprices_order() {
    let h = TestHarness::new();
    h.services().coupons.add_flat("FLAT500", 500);
    h.services()
        .gateway_checkout
        .set_action(ShopperAction::Dismiss);
    let first = h.checkout(&h.request(2499)).await;

    h.services().gateway_checkout.set_action(ShopperAction::Pay);
    let second = h.checkout(&h.request(2499).with_coupon("FLAT500")).await;

    let order_id = second.outcome.order_id().unwrap();
    assert!(second.outcome.is_success());
    assert_ne!(first.session.order_id(), Some(order_id));
    let order = h.services().orders.order(order_id).unwrap();
    assert_eq!(order.total_amount.minor(), 1999);
    assert_eq!(order.status, OrderStatus::Success);
    assert_eq!(
        h.services().orders.order(first.session.order_id().unwrap()).unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(h.services().gateway_checkout.requests()[1].amount_subunits, 199_900);
}

#[tokio::test]
async fn test_buying_same_cart_twice_creates_two_orders() {
    let h = TestHarness::new();
    let request = h.request(2499);

    let first = h.checkout(&request).await;
    let second = h.checkout(&request).await;

    assert!(first.outcome.is_success());
    assert!(second.outcome.is_success());
    assert_ne!(first.outcome.order_id(), second.outcome.order_id());
    assert_eq!(h.services().orders.order_count(), 2);
    assert_eq!(h.services().capture.captured_count(), 2);
    for report in [&first, &second] {
        let order_id = report.outcome.order_id().unwrap();
        assert_eq!(
            h.services().orders.order(order_id).unwrap().status,
            OrderStatus::Success
        );
    }
}

#[tokio::test]
async fn test_settled_order_is_never_charged_again() {
    let h = TestHarness::new();
    h.services().orders.set_collapse_settled(true);
    let request = h.request(2499);

    let first = h.checkout(&request).await;
    let second = h.checkout(&request).await;

    assert!(first.outcome.is_success());
    match &second.outcome {
        CheckoutOutcome::Failed {
            error: CheckoutError::Integrity { stage, detail },
        } => {
            assert_eq!(*stage, "create_order");
            assert!(detail.contains("already success"));
        }
        other => panic!("expected Integrity, got {other:?}"),
    }
    assert_eq!(h.services().gateway.payment_order_count(), 1);
    assert_eq!(h.services().capture.captured_count(), 1);
    assert_eq!(second.session.order_id(), None);
}

#[tokio::test]
async fn test_capture_unavailable_is_payment_failure() {
    let h = TestHarness::new();
    h.services()
        .capture
        .set_behavior(CaptureBehavior::Unavailable);

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::PaymentFailed(_)
        }
    ));
    assert_eq!(h.services().orders.detail_calls(), 0);
}

#[tokio::test]
async fn test_gateway_order_failure_is_service_error() {
    let h = TestHarness::new();
    h.services().gateway.set_fail_on_create(true);

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Service {
                operation: "create_payment_order",
                ..
            }
        }
    ));
    assert_eq!(report.session.state(), CheckoutState::Failed);
    assert_eq!(report.session.failure().unwrap().kind, "service");
}

#[tokio::test]
async fn test_entitlement_service_down_fails_before_order() {
    let h = TestHarness::new();
    h.services().entitlements.set_unavailable(true);

    let report = h.checkout(&h.request(2499)).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Service {
                operation: "check_entitlement",
                ..
            }
        }
    ));
    assert_eq!(h.services().orders.create_calls(), 0);
    assert_eq!(h.services().orders.free_purchase_calls(), 0);
}

#[tokio::test]
async fn test_unauthenticated_checkout_makes_no_calls() {
    let h = TestHarness::new();
    let request = CheckoutRequest {
        user_id: None,
        cart: cart(2499),
        coupon_code: Some("FLAT500".to_string()),
    };

    let report = h.checkout(&request).await;

    assert!(matches!(
        report.outcome,
        CheckoutOutcome::Failed {
            error: CheckoutError::Validation(ValidationError::Unauthenticated)
        }
    ));
    assert_eq!(h.services().entitlements.check_count(), 0);
    assert_eq!(h.services().coupons.validation_count(), 0);
}

#[tokio::test]
async fn test_second_checkout_rejected_while_first_runs() {
    let release = Arc::new(Notify::new());
    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        GatewayConfig::new("rzp_test_key"),
        CheckoutServices::with_gateway_checkout(
            ScriptedGatewayCheckout::new().held_by(Arc::clone(&release)),
        ),
    ));
    let request = CheckoutRequest::new(UserId::new(), cart(2499));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let request = request.clone();
        tokio::spawn(async move { orchestrator.checkout(&request).await })
    };

    while orchestrator.services().gateway_checkout.open_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(orchestrator.guard().is_active());

    let second = orchestrator.checkout(&request).await;
    assert!(matches!(second, Err(CheckoutError::AlreadyInProgress)));
    assert_eq!(orchestrator.services().entitlements.check_count(), 1);
    assert_eq!(orchestrator.services().orders.create_calls(), 1);

    release.notify_one();
    let report = first.await.unwrap().unwrap();

    assert!(report.outcome.is_success());
    assert!(!orchestrator.guard().is_active());
    assert_eq!(orchestrator.services().ui.notices().len(), 1);
}

#[tokio::test]
async fn test_journal_replays_and_round_trips() {
    let h = TestHarness::new();
    h.services().capture.set_behavior(CaptureBehavior::Timeout);

    let report = h.checkout(&h.request(2499)).await;

    let json = serde_json::to_string(&report.events).unwrap();
    let restored: Vec<CheckoutEvent> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, report.events);
    assert_eq!(CheckoutSession::replay(restored), report.session);
    assert_eq!(report.session.version(), report.events.len() as u64);
}
