//! Payment capture service trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{CaptureOutcome, Money, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::services::gateway::InMemoryPaymentGatewayService;
use crate::services::orders::InMemoryOrderService;

/// Request body for capturing an authorized payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub payment_record_id: String,
    pub gateway_payment_id: String,
    /// Amount in storefront minor units.
    pub amount: Money,
}

/// Settles authorized payments and marks the order paid.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Captures the payment.
    ///
    /// `Timeout` is a structured outcome, not an error: the service gave up
    /// waiting on the gateway and the charge may still exist.
    async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, ServiceError>;
}

/// Folds rejections that carry a known outcome in their message back into
/// the structured outcome. Other errors pass through.
pub fn normalize_capture(
    result: Result<CaptureOutcome, ServiceError>,
) -> Result<CaptureOutcome, ServiceError> {
    match result {
        Err(ServiceError::Rejected { message }) => match CaptureOutcome::from_rejection(&message) {
            Some(outcome) => Ok(outcome),
            None => Err(ServiceError::Rejected { message }),
        },
        other => other,
    }
}

/// How the in-memory capture backend behaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureBehavior {
    /// Capture and mark the order successful.
    #[default]
    Settle,
    /// Settle, but answer `Timeout` as if the response was lost.
    SettleThenTimeout,
    /// Answer `Timeout` and leave the order pending.
    Timeout,
    /// Refuse with this message.
    Reject(String),
    /// Service unreachable.
    Unavailable,
}

#[derive(Debug, Default)]
struct InMemoryCaptureState {
    behavior: CaptureBehavior,
    captured: HashSet<String>,
    calls: usize,
}

/// In-memory capture service for testing.
///
/// Shares state with the in-memory gateway (to find the order behind a
/// payment record) and the in-memory order service (to settle it).
#[derive(Debug, Clone)]
pub struct InMemoryCaptureService {
    state: Arc<RwLock<InMemoryCaptureState>>,
    gateway: InMemoryPaymentGatewayService,
    orders: InMemoryOrderService,
}

impl InMemoryCaptureService {
    /// Creates a capture backend over the given gateway and order stores.
    pub fn new(gateway: InMemoryPaymentGatewayService, orders: InMemoryOrderService) -> Self {
        Self {
            state: Arc::default(),
            gateway,
            orders,
        }
    }

    /// Sets how subsequent capture calls behave.
    pub fn set_behavior(&self, behavior: CaptureBehavior) {
        self.state.write().unwrap().behavior = behavior;
    }

    /// Marks a payment record as captured out of band.
    pub fn mark_captured(&self, payment_record_id: &str) {
        self.state
            .write()
            .unwrap()
            .captured
            .insert(payment_record_id.to_string());
    }

    /// Returns the number of capture calls received.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls
    }

    /// Returns the number of payment records actually captured.
    pub fn captured_count(&self) -> usize {
        self.state.read().unwrap().captured.len()
    }

    /// Settles the order behind the payment record; returns false if it was
    /// already captured.
    fn settle(
        &self,
        state: &mut InMemoryCaptureState,
        request: &CaptureRequest,
    ) -> Result<bool, ServiceError> {
        let (order_id, payment_order) = self
            .gateway
            .payment_record(&request.payment_record_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("payment record {}", request.payment_record_id))
            })?;

        if payment_order.amount != request.amount {
            return Err(ServiceError::rejected(format!(
                "capture amount {} does not match payment order amount {}",
                request.amount, payment_order.amount
            )));
        }

        let fresh = state.captured.insert(request.payment_record_id.clone());
        self.orders.set_status(&order_id, OrderStatus::Success);
        Ok(fresh)
    }
}

#[async_trait]
impl CaptureService for InMemoryCaptureService {
    async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.calls += 1;

        match state.behavior.clone() {
            CaptureBehavior::Settle => {
                if self.settle(&mut state, &request)? {
                    Ok(CaptureOutcome::Captured)
                } else {
                    Ok(CaptureOutcome::AlreadyCaptured)
                }
            }
            CaptureBehavior::SettleThenTimeout => {
                self.settle(&mut state, &request)?;
                Ok(CaptureOutcome::Timeout)
            }
            CaptureBehavior::Timeout => Ok(CaptureOutcome::Timeout),
            CaptureBehavior::Reject(message) => Err(ServiceError::Rejected { message }),
            CaptureBehavior::Unavailable => {
                Err(ServiceError::Unavailable("capture service down".to_string()))
            }
        }
    }
}
