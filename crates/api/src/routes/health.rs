//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// False until a merchant key is configured; paid checkouts fail meanwhile.
    pub gateway_configured: bool,
    pub currency: String,
}

/// GET /health — returns service health and gateway readiness.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gateway = state.orchestrator.config();
    Json(HealthResponse {
        status: "ok",
        gateway_configured: gateway.require_merchant_key().is_ok(),
        currency: gateway.currency.to_string(),
    })
}
