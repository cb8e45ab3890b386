//! Order lookup endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{OrderService, ServiceError};
use domain::OrderId;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    pub total_amount: i64,
    pub product_ids: Vec<u64>,
}

/// GET /orders/{id} — read an order's authoritative status.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orchestrator
        .services()
        .orders
        .order_detail(&OrderId::new(id.as_str()))
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => ApiError::NotFound(format!("Order {id} not found")),
            other => ApiError::Service(other),
        })?;

    Ok(Json(OrderResponse {
        id: order.id.to_string(),
        status: order.status.to_string(),
        total_amount: order.total_amount.minor(),
        product_ids: order.product_ids.iter().map(|id| id.get()).collect(),
    }))
}
