//! Payment gateway service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Currency, Money, OrderId, PaymentOrder};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Request body for creating a gateway payment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentOrderRequest {
    /// Amount in storefront minor units.
    pub amount: Money,
    pub currency: Currency,
    pub order_id: OrderId,
    pub description: String,
}

/// Creates payment orders on the third-party gateway.
#[async_trait]
pub trait PaymentGatewayService: Send + Sync {
    /// Creates a payment order for a storefront order.
    async fn create_payment_order(
        &self,
        request: CreatePaymentOrderRequest,
    ) -> Result<PaymentOrder, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    /// Keyed by payment record id.
    payment_orders: HashMap<String, (OrderId, PaymentOrder)>,
    next_id: u32,
    fail_on_create: bool,
    amount_override: Option<Money>,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGatewayService {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGatewayService {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes create calls fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Records this amount on new payment orders instead of the requested one.
    pub fn set_amount_override(&self, amount: Option<Money>) {
        self.state.write().unwrap().amount_override = amount;
    }

    /// Returns the number of payment orders created.
    pub fn payment_order_count(&self) -> usize {
        self.state.read().unwrap().payment_orders.len()
    }

    /// Looks up the storefront order and payment order behind a payment record.
    pub fn payment_record(&self, payment_record_id: &str) -> Option<(OrderId, PaymentOrder)> {
        self.state
            .read()
            .unwrap()
            .payment_orders
            .get(payment_record_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentGatewayService for InMemoryPaymentGatewayService {
    async fn create_payment_order(
        &self,
        request: CreatePaymentOrderRequest,
    ) -> Result<PaymentOrder, ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(ServiceError::Unavailable("gateway unreachable".to_string()));
        }

        state.next_id += 1;
        let payment_order = PaymentOrder {
            gateway_order_id: format!("order_GW{:04}", state.next_id),
            payment_record_id: format!("PR-{:04}", state.next_id),
            amount: state.amount_override.unwrap_or(request.amount),
            currency: request.currency,
        };
        state.payment_orders.insert(
            payment_order.payment_record_id.clone(),
            (request.order_id, payment_order.clone()),
        );

        Ok(payment_order)
    }
}
