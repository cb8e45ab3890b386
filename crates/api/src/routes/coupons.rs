//! Coupon validation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{CheckoutError, ValidationError};
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_amount: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CouponResponse {
    pub code: String,
    pub coupon_name: String,
    pub discount_type: String,
    pub label: String,
}

#[derive(Serialize)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub discount: i64,
    pub final_amount: i64,
    pub coupon: Option<CouponResponse>,
    pub message: Option<String>,
}

// -- Handlers --

/// POST /coupons/validate — validate a code against an order amount.
///
/// A code the coupon service does not accept is a 200 with `valid: false`
/// and the undiscounted amount, so the UI can drop any cached discount.
#[tracing::instrument(skip(state, req), fields(code = %req.code))]
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, ApiError> {
    let amount = Money::from_minor(req.order_amount);

    match state.orchestrator.coupon_engine().validate(&req.code, amount).await {
        Ok(applied) => Ok(Json(ValidateCouponResponse {
            valid: true,
            discount: applied.discount.minor(),
            final_amount: applied.final_amount().minor(),
            coupon: Some(CouponResponse {
                code: applied.coupon.code.to_string(),
                coupon_name: applied.coupon.coupon_name.clone(),
                discount_type: applied.coupon.discount_type.as_str().to_string(),
                label: applied.coupon.display_label(),
            }),
            message: None,
        })),
        Err(CheckoutError::Validation(ValidationError::CouponRejected { reason, .. })) => {
            Ok(Json(ValidateCouponResponse {
                valid: false,
                discount: 0,
                final_amount: amount.minor().max(0),
                coupon: None,
                message: Some(reason),
            }))
        }
        Err(CheckoutError::Validation(e)) => Err(ApiError::BadRequest(e.to_string())),
        Err(e) => Err(e.into()),
    }
}
