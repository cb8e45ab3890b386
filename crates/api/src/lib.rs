//! HTTP API for storefront checkout.
//!
//! Exposes coupon validation, checkout and order lookup over the in-memory
//! checkout services, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutOrchestrator, CheckoutServices};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/coupons/validate", post(routes::coupons::validate))
        .route("/checkout", post(routes::checkout::create))
        .route("/orders/{id}", get(routes::orders::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over in-memory services.
///
/// Seeds two demo coupons: `FLAT500` (500 off) and `TENOFF` (10% off).
pub fn create_default_state(config: &Config) -> Arc<AppState> {
    let services = CheckoutServices::in_memory();
    services.coupons.add_flat("FLAT500", 500);
    services.coupons.add_percentage("TENOFF", 10);

    if config.gateway.require_merchant_key().is_err() {
        tracing::warn!("GATEWAY_MERCHANT_KEY is not set, paid checkouts will fail");
    }

    Arc::new(AppState::new(CheckoutOrchestrator::new(
        config.gateway.clone(),
        services,
    )))
}
