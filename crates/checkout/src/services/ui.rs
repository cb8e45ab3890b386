//! Storefront UI side effects: notices and cache invalidation.

use std::sync::{Arc, RwLock};

use domain::OrderId;
use serde::{Deserialize, Serialize};

/// The single message shown when a checkout ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The order is placed and paid (or free).
    OrderPlaced { order_id: OrderId },
    /// Payment may have gone through; send the shopper to their orders.
    VerifyInOrders { order_id: OrderId, message: String },
    /// The attempt failed; nothing was charged.
    CheckoutFailed { message: String },
}

/// Client-side caches that go stale when an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    Cart,
    Orders,
}

/// Hooks into the storefront UI.
pub trait StorefrontUi: Send + Sync {
    /// Shows a toast or banner.
    fn notify(&self, notice: Notice);

    /// Drops a cached list so dependent views refetch.
    fn invalidate(&self, scope: CacheScope);
}

#[derive(Debug, Default)]
struct RecordingState {
    notices: Vec<Notice>,
    invalidations: Vec<CacheScope>,
}

/// UI that records what it was told, for tests and the HTTP front end.
#[derive(Debug, Clone, Default)]
pub struct RecordingUi {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingUi {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notice shown so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.state.read().unwrap().notices.clone()
    }

    /// Returns every cache invalidation so far.
    pub fn invalidations(&self) -> Vec<CacheScope> {
        self.state.read().unwrap().invalidations.clone()
    }
}

impl StorefrontUi for RecordingUi {
    fn notify(&self, notice: Notice) {
        tracing::debug!(?notice, "storefront notice");
        self.state.write().unwrap().notices.push(notice);
    }

    fn invalidate(&self, scope: CacheScope) {
        self.state.write().unwrap().invalidations.push(scope);
    }
}
