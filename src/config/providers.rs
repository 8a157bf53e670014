use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;

/// Stripe Checkout credentials (card gateway)
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
}

/// PayPal REST credentials (wallet provider)
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
    pub base_url: String,
}

/// Paymob Accept credentials (regional gateway)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymobConfig {
    pub api_key: String,
    pub hmac_secret: String,
    pub integration_id: i64,
    pub iframe_id: i64,
    pub base_url: String,
}

pub(super) fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(super) fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| AppError::Configuration(format!("{} not set", name)))
}

impl StripeConfig {
    /// `None` when `STRIPE_SECRET_KEY` is absent, which leaves the provider unregistered
    pub fn from_env() -> Result<Option<Self>> {
        let Some(secret_key) = optional("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };

        Ok(Some(StripeConfig {
            secret_key,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            base_url: optional("STRIPE_BASE_URL")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
        }))
    }
}

impl PayPalConfig {
    pub fn from_env() -> Result<Option<Self>> {
        let Some(client_id) = optional("PAYPAL_CLIENT_ID") else {
            return Ok(None);
        };

        Ok(Some(PayPalConfig {
            client_id,
            client_secret: required("PAYPAL_CLIENT_SECRET")?,
            webhook_secret: required("PAYPAL_WEBHOOK_SECRET")?,
            base_url: optional("PAYPAL_BASE_URL")
                .unwrap_or_else(|| "https://api-m.sandbox.paypal.com".to_string()),
        }))
    }
}

impl PaymobConfig {
    pub fn from_env() -> Result<Option<Self>> {
        let Some(api_key) = optional("PAYMOB_API_KEY") else {
            return Ok(None);
        };

        Ok(Some(PaymobConfig {
            api_key,
            hmac_secret: required("PAYMOB_HMAC_SECRET")?,
            integration_id: required("PAYMOB_INTEGRATION_ID")?
                .parse()
                .map_err(|_| AppError::Configuration("Invalid PAYMOB_INTEGRATION_ID".to_string()))?,
            iframe_id: required("PAYMOB_IFRAME_ID")?
                .parse()
                .map_err(|_| AppError::Configuration("Invalid PAYMOB_IFRAME_ID".to_string()))?,
            base_url: optional("PAYMOB_BASE_URL")
                .unwrap_or_else(|| "https://accept.paymob.com".to_string()),
        }))
    }
}
