//! Capture reconciliation.

use domain::{OrderId, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::services::OrderService;

/// What the order service says about an order whose capture timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reconciliation {
    /// The order is paid; the capture did go through.
    Succeeded,
    /// Payment could not be confirmed. `status` is None if the order could
    /// not be read at all.
    Unresolved { status: Option<OrderStatus> },
}

impl Reconciliation {
    /// Returns the result label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reconciliation::Succeeded => "succeeded",
            Reconciliation::Unresolved { .. } => "unresolved",
        }
    }

    /// Returns the order status that was read, if any.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            Reconciliation::Succeeded => Some(OrderStatus::Success),
            Reconciliation::Unresolved { status } => *status,
        }
    }
}

/// Reads the authoritative order state after an ambiguous capture.
///
/// Only ever calls `order_detail`, so it is safe to run any number of times
/// and can never start a new charge.
pub struct Reconciler<'a, O: OrderService> {
    orders: &'a O,
}

impl<'a, O: OrderService> Reconciler<'a, O> {
    /// Creates a reconciler over the given order service.
    pub fn new(orders: &'a O) -> Self {
        Self { orders }
    }

    /// Decides whether the order behind `order_id` was paid.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn reconcile(&self, order_id: &OrderId) -> Reconciliation {
        let result = match self.orders.order_detail(order_id).await {
            Ok(order) if order.status == OrderStatus::Success => Reconciliation::Succeeded,
            Ok(order) => Reconciliation::Unresolved {
                status: Some(order.status),
            },
            Err(e) => {
                tracing::warn!(error = %e, "order detail unavailable during reconciliation");
                Reconciliation::Unresolved { status: None }
            }
        };

        metrics::counter!("capture_reconciliations_total", "result" => result.as_str())
            .increment(1);
        tracing::info!(result = result.as_str(), "reconciliation finished");
        result
    }
}
