//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ServiceError, ValidationError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout ended without an order, or could not start.
    Checkout(CheckoutError),
    /// A backing service failed.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "bad_request"),
            ApiError::Checkout(err) => {
                let status = checkout_status(&err);
                if status.is_server_error() {
                    tracing::error!(kind = err.kind(), error = %err, "checkout error");
                }
                (status, err.user_message(), err.kind())
            }
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::Validation(ValidationError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::AlreadyInProgress => StatusCode::CONFLICT,
        CheckoutError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::GatewayConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::MissingOrderId | CheckoutError::Service { .. } => StatusCode::BAD_GATEWAY,
        CheckoutError::CaptureAmbiguous { .. } | CheckoutError::UnresolvedPayment { .. } => {
            StatusCode::ACCEPTED
        }
        CheckoutError::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String, &'static str) {
    match &err {
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), "not_found"),
        ServiceError::Rejected { .. } => (StatusCode::BAD_REQUEST, err.to_string(), "rejected"),
        ServiceError::Unavailable(_) => {
            tracing::error!(error = %err, "backing service unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string(), "unavailable")
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}
