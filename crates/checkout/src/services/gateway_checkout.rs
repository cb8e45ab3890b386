//! Hand-off to the gateway's embedded checkout.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Currency, OrderId};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// What the embedded checkout is opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCheckoutRequest {
    pub gateway_order_id: String,
    /// Amount in the gateway's sub-unit.
    pub amount_subunits: i64,
    pub currency: Currency,
    pub merchant_key: String,
    pub theme_color: String,
    pub description: String,
    pub order_id: OrderId,
}

/// How the shopper left the embedded checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GatewayCheckoutResult {
    /// Payment authorized.
    Completed { gateway_payment_id: String },
    /// The shopper closed the sheet.
    Dismissed,
    /// The gateway declined the payment.
    Rejected { reason: String },
}

/// The user-interactive gateway step.
///
/// Suspends until the shopper finishes or abandons the sheet; there is no
/// orchestrator-side timeout on this call.
#[async_trait]
pub trait GatewayCheckout: Send + Sync {
    /// Opens the gateway sheet and waits for the shopper.
    async fn collect_payment(&self, request: GatewayCheckoutRequest) -> GatewayCheckoutResult;
}

/// Scripted shopper behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShopperAction {
    #[default]
    Pay,
    Dismiss,
    Decline(String),
}

#[derive(Debug, Default)]
struct ScriptedState {
    action: ShopperAction,
    requests: Vec<GatewayCheckoutRequest>,
    next_payment: u32,
}

/// Gateway checkout that answers from a script, for testing and demos.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGatewayCheckout {
    state: Arc<RwLock<ScriptedState>>,
    hold: Option<Arc<Notify>>,
}

impl ScriptedGatewayCheckout {
    /// Creates a gateway where the shopper always pays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what the shopper does on the next sheets.
    pub fn set_action(&self, action: ShopperAction) {
        self.state.write().unwrap().action = action;
    }

    /// Makes every sheet wait until `release` is notified before answering.
    pub fn held_by(mut self, release: Arc<Notify>) -> Self {
        self.hold = Some(release);
        self
    }

    /// Returns every request the sheet was opened with.
    pub fn requests(&self) -> Vec<GatewayCheckoutRequest> {
        self.state.read().unwrap().requests.clone()
    }

    /// Returns the number of times the sheet was opened.
    pub fn open_count(&self) -> usize {
        self.state.read().unwrap().requests.len()
    }
}

#[async_trait]
impl GatewayCheckout for ScriptedGatewayCheckout {
    async fn collect_payment(&self, request: GatewayCheckoutRequest) -> GatewayCheckoutResult {
        self.state.write().unwrap().requests.push(request);

        if let Some(release) = &self.hold {
            release.notified().await;
        }

        let mut state = self.state.write().unwrap();
        match state.action.clone() {
            ShopperAction::Pay => {
                state.next_payment += 1;
                GatewayCheckoutResult::Completed {
                    gateway_payment_id: format!("pay_{:04}", state.next_payment),
                }
            }
            ShopperAction::Dismiss => GatewayCheckoutResult::Dismissed,
            ShopperAction::Decline(reason) => GatewayCheckoutResult::Rejected { reason },
        }
    }
}
