//! Gateway payment orders and capture results.

use serde::{Deserialize, Serialize};

use crate::money::{Currency, Money};

/// A payment order created on the gateway against a storefront order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub gateway_order_id: String,
    /// Internal payment record the capture call refers to.
    pub payment_record_id: String,
    /// Amount in storefront minor units, as recorded by the gateway service.
    pub amount: Money,
    pub currency: Currency,
}

/// Structured result of a capture call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// The payment was charged by this call.
    Captured,
    /// The payment had already been charged; equivalent to `Captured`.
    AlreadyCaptured,
    /// The capture service gave up waiting; the charge may or may not exist.
    Timeout,
    /// The capture service refused or could not be reached; nothing was charged.
    Failed,
}

impl CaptureOutcome {
    /// Returns true if the money is known to be settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, CaptureOutcome::Captured | CaptureOutcome::AlreadyCaptured)
    }

    /// Maps a capture rejection message from older service versions onto the
    /// structured outcome it stands for, if any.
    pub fn from_rejection(message: &str) -> Option<Self> {
        let lower = message.to_ascii_lowercase();
        if lower.contains("already captured") {
            Some(CaptureOutcome::AlreadyCaptured)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Some(CaptureOutcome::Timeout)
        } else {
            None
        }
    }

    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureOutcome::Captured => "captured",
            CaptureOutcome::AlreadyCaptured => "already_captured",
            CaptureOutcome::Timeout => "timeout",
            CaptureOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A capture attempt and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub payment_record_id: String,
    pub gateway_payment_id: String,
    pub amount: Money,
    pub outcome: CaptureOutcome,
}
