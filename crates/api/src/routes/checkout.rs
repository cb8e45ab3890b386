//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CheckoutError, CheckoutGuard, CheckoutOutcome, CheckoutRequest};
use common::UserId;
use domain::{CartLine, CartSnapshot, DomainEvent, Money};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutBody {
    /// Absent for anonymous shoppers; checkout then fails validation.
    pub user_id: Option<String>,
    pub lines: Vec<CartLineRequest>,
    pub coupon_code: Option<String>,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub product_id: String,
    pub unit_price: i64,
    #[serde(default)]
    pub title: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub status: &'static str,
    pub order_id: String,
    pub route: Option<&'static str>,
    pub subtotal: i64,
    pub discount: i64,
    pub final_amount: i64,
    pub state: String,
    pub message: Option<String>,
    /// Event types of the session journal, in order.
    pub events: Vec<&'static str>,
}

// -- Handlers --

/// POST /checkout — run a checkout for the submitted cart.
///
/// 201 with the order on success, 202 when payment could not be confirmed,
/// 409 while the same shopper has a checkout running, otherwise the
/// status of the error that ended the checkout.
#[tracing::instrument(skip(state, body), fields(lines = body.lines.len()))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let user_id = body
        .user_id
        .as_deref()
        .map(|raw| {
            uuid::Uuid::parse_str(raw)
                .map(UserId::from_uuid)
                .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))
        })
        .transpose()?;

    let lines = body
        .lines
        .into_iter()
        .map(|line| {
            let price = Money::try_from_minor(line.unit_price)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            Ok(CartLine::new(line.product_id, price, line.title))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let request = CheckoutRequest {
        user_id,
        cart: CartSnapshot::new(lines).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        coupon_code: body.coupon_code,
    };

    let guard = match user_id {
        Some(user_id) => state.guard_for(user_id),
        None => CheckoutGuard::new(),
    };
    let result = state
        .orchestrator
        .checkout_with_guard(&guard, &request)
        .await;
    drop(guard);
    if let Some(user_id) = user_id {
        state.release_guard(user_id);
    }
    let report = result?;

    let session = &report.session;
    let events = report.events.iter().map(DomainEvent::event_type).collect();

    let (status, order_id, message) = match report.outcome {
        CheckoutOutcome::Succeeded { order_id, .. } => (StatusCode::CREATED, order_id, None),
        CheckoutOutcome::Unresolved { order_id } => {
            let message = CheckoutError::UnresolvedPayment {
                order_id: order_id.clone(),
            }
            .user_message();
            (StatusCode::ACCEPTED, order_id, Some(message))
        }
        CheckoutOutcome::Failed { error } => return Err(error.into()),
    };

    let response = CheckoutResponse {
        status: if status == StatusCode::CREATED {
            "succeeded"
        } else {
            "unresolved"
        },
        order_id: order_id.to_string(),
        route: session.route().map(|route| route.as_str()),
        subtotal: session.subtotal().minor(),
        discount: session.discount().minor(),
        final_amount: session.final_amount().minor(),
        state: session.state().to_string(),
        message,
        events,
    };

    Ok((status, Json(response)))
}
