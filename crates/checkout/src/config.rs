//! Payment gateway configuration.

use domain::Currency;

use crate::error::CheckoutError;

/// Settings the storefront needs to hand a payment to the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Publishable merchant key passed to the embedded checkout.
    pub merchant_key: Option<String>,
    pub currency: Currency,
    pub theme_color: String,
    /// Line shown on the gateway's payment sheet.
    pub description: String,
}

impl GatewayConfig {
    /// Creates a configuration with the given merchant key and defaults elsewhere.
    pub fn new(merchant_key: impl Into<String>) -> Self {
        Self {
            merchant_key: Some(merchant_key.into()),
            ..Self::default()
        }
    }

    /// Returns the merchant key, or a `GatewayConfig` error if it is missing or blank.
    pub fn require_merchant_key(&self) -> Result<&str, CheckoutError> {
        match self.merchant_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            Some(_) => Err(CheckoutError::GatewayConfig(
                "merchant key is blank".to_string(),
            )),
            None => Err(CheckoutError::GatewayConfig(
                "merchant key is missing".to_string(),
            )),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            merchant_key: None,
            currency: Currency::Inr,
            theme_color: "#3399cc".to_string(),
            description: "Storefront purchase".to_string(),
        }
    }
}
