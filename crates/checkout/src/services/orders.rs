//! Order service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{CouponCode, IdempotencyKey, Money, Order, OrderId, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Request body for creating a paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// One entry per cart line.
    pub product_ids: Vec<ProductId>,
    pub final_amount: Money,
    pub coupon_code: Option<CouponCode>,
    pub idempotency_key: IdempotencyKey,
}

/// Why a purchase costs nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreePurchaseMethod {
    /// Covered by the user's active plan.
    Subscription,
    /// A coupon discounted the cart to zero.
    Coupon,
}

impl FreePurchaseMethod {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FreePurchaseMethod::Subscription => "subscription",
            FreePurchaseMethod::Coupon => "coupon",
        }
    }
}

/// Request body for the free-purchase call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePurchaseRequest {
    pub payment_method: FreePurchaseMethod,
    pub coupon_code: Option<CouponCode>,
    pub product_ids: Vec<ProductId>,
    pub idempotency_key: IdempotencyKey,
}

/// What the order service answers on creation.
///
/// The id is optional on the wire; checkout treats its absence as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Option<OrderId>,
    /// Amount the server recorded, when it reports one.
    pub total_amount: Option<Money>,
    /// Status of the returned order, when the server reports one.
    pub status: Option<OrderStatus>,
}

/// Remote order management.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates a pending order for a paid checkout.
    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderReceipt, ServiceError>;

    /// Creates a settled order that needs no payment.
    async fn create_free_purchase(
        &self,
        request: FreePurchaseRequest,
    ) -> Result<OrderReceipt, ServiceError>;

    /// Reads an order back. Read-only.
    async fn order_detail(&self, order_id: &OrderId) -> Result<Order, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    by_key: HashMap<IdempotencyKey, OrderId>,
    next_id: u32,
    create_calls: usize,
    free_purchase_calls: usize,
    detail_calls: usize,
    last_create: Option<CreateOrderRequest>,
    last_free_purchase: Option<FreePurchaseRequest>,
    fail_on_create: bool,
    omit_order_id: bool,
    recorded_amount_override: Option<Money>,
    detail_unavailable: bool,
    collapse_settled: bool,
}

impl InMemoryOrderState {
    /// Returns the order a repeat submission of `key` collapses onto.
    ///
    /// Only a pending order is reused; once settled, the same key starts a
    /// new order.
    fn existing(&self, key: &IdempotencyKey) -> Option<&Order> {
        self.by_key
            .get(key)
            .and_then(|id| self.orders.get(id))
            .filter(|order| match order.status {
                OrderStatus::Pending => true,
                OrderStatus::Success => self.collapse_settled,
                OrderStatus::Failed => false,
            })
    }

    fn insert(
        &mut self,
        key: IdempotencyKey,
        product_ids: Vec<ProductId>,
        total_amount: Money,
        status: OrderStatus,
    ) -> Order {
        self.next_id += 1;
        let order = Order {
            id: OrderId::new(format!("ORD-{:04}", self.next_id)),
            status,
            total_amount,
            product_ids,
        };
        self.orders.insert(order.id.clone(), order.clone());
        self.by_key.insert(key, order.id.clone());
        order
    }

    fn receipt(&self, order: &Order) -> OrderReceipt {
        OrderReceipt {
            order_id: (!self.omit_order_id).then(|| order.id.clone()),
            total_amount: Some(order.total_amount),
            status: Some(order.status),
        }
    }
}

/// In-memory order service for testing.
///
/// Collapses repeated submissions with the same idempotency key into the
/// existing order while that order is still pending.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    /// Creates a new empty order service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an order's status, as the capture backend does.
    pub fn set_status(&self, order_id: &OrderId, status: OrderStatus) -> bool {
        match self.state.write().unwrap().orders.get_mut(order_id) {
            Some(order) => {
                order.status = status;
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the order, if it exists.
    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.state.read().unwrap().orders.get(order_id).cloned()
    }

    /// Returns the number of distinct orders stored.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns the number of create-order calls received.
    pub fn create_calls(&self) -> usize {
        self.state.read().unwrap().create_calls
    }

    /// Returns the number of free-purchase calls received.
    pub fn free_purchase_calls(&self) -> usize {
        self.state.read().unwrap().free_purchase_calls
    }

    /// Returns the number of order-detail calls received.
    pub fn detail_calls(&self) -> usize {
        self.state.read().unwrap().detail_calls
    }

    /// Returns the last create-order request.
    pub fn last_create_request(&self) -> Option<CreateOrderRequest> {
        self.state.read().unwrap().last_create.clone()
    }

    /// Returns the last free-purchase request.
    pub fn last_free_purchase_request(&self) -> Option<FreePurchaseRequest> {
        self.state.read().unwrap().last_free_purchase.clone()
    }

    /// Makes create-order calls fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes creation responses leave out the order id.
    pub fn set_omit_order_id(&self, omit: bool) {
        self.state.write().unwrap().omit_order_id = omit;
    }

    /// Records this amount on new orders instead of the requested one.
    pub fn set_recorded_amount_override(&self, amount: Option<Money>) {
        self.state.write().unwrap().recorded_amount_override = amount;
    }

    /// Makes repeat submissions collapse onto orders that already succeeded.
    pub fn set_collapse_settled(&self, collapse: bool) {
        self.state.write().unwrap().collapse_settled = collapse;
    }

    /// Makes order-detail calls fail with `Unavailable`.
    pub fn set_detail_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().detail_unavailable = unavailable;
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderReceipt, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.create_calls += 1;
        state.last_create = Some(request.clone());

        if state.fail_on_create {
            return Err(ServiceError::Unavailable("order service down".to_string()));
        }

        if let Some(existing) = state.existing(&request.idempotency_key) {
            let receipt = state.receipt(existing);
            return Ok(receipt);
        }

        let amount = state
            .recorded_amount_override
            .unwrap_or(request.final_amount);
        let order = state.insert(
            request.idempotency_key,
            request.product_ids,
            amount,
            OrderStatus::Pending,
        );
        Ok(state.receipt(&order))
    }

    async fn create_free_purchase(
        &self,
        request: FreePurchaseRequest,
    ) -> Result<OrderReceipt, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.free_purchase_calls += 1;
        state.last_free_purchase = Some(request.clone());

        if state.fail_on_create {
            return Err(ServiceError::Unavailable("order service down".to_string()));
        }

        if let Some(existing) = state.existing(&request.idempotency_key) {
            let receipt = state.receipt(existing);
            return Ok(receipt);
        }

        let order = state.insert(
            request.idempotency_key,
            request.product_ids,
            Money::zero(),
            OrderStatus::Success,
        );
        Ok(state.receipt(&order))
    }

    async fn order_detail(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.detail_calls += 1;

        if state.detail_unavailable {
            return Err(ServiceError::Unavailable("order service down".to_string()));
        }

        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))
    }
}
