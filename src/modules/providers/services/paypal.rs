use super::http::{build_client, is_rejection, read_json, transport_error};
use super::signature::verify_hmac_sha256_hex;
use super::strategy::{
    CreateSessionParams, PaymentStrategy, ProviderPaymentStatus, ProviderStatus, RefundParams,
    RefundResult, SessionResult, WebhookPaymentInfo,
};
use crate::config::PayPalConfig;
use crate::core::{AppError, Currency, Result};
use crate::modules::providers::models::{PaymentMethod, PaymentProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const VENDOR: &str = "PayPal";

/// PayPal Orders v2 client for the wallet provider
///
/// API Documentation: https://developer.paypal.com/docs/api/orders/v2/
pub struct PayPalStrategy {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl PayPalStrategy {
    pub fn new(config: &PayPalConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// Approval links stay usable for three hours
    pub fn session_ttl() -> ChronoDuration {
        ChronoDuration::hours(3)
    }

    /// OAuth2 client-credentials token, reused until shortly before expiry
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/v1/oauth2/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        let token: PayPalToken = read_json(VENDOR, response).await?;
        let lifetime = (token.expires_in - 60).max(0);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        });

        Ok(token.access_token)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<PayPalOrder> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders/{}", self.base_url, order_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        read_json(VENDOR, response).await
    }

    /// An approved order holds funds only once captured
    async fn capture_order(&self, order_id: &str) -> Result<PayPalOrder> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders/{}/capture", self.base_url, order_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("capture-{}", order_id))
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        read_json(VENDOR, response).await
    }

    fn order_status(status: &str) -> ProviderStatus {
        match status {
            "COMPLETED" => ProviderStatus::Completed,
            "APPROVED" => ProviderStatus::Processing,
            "VOIDED" => ProviderStatus::Cancelled,
            _ => ProviderStatus::Pending,
        }
    }

    fn order_to_status(order: &PayPalOrder) -> ProviderPaymentStatus {
        let unit_amount = order.purchase_units.first().and_then(|unit| unit.amount.as_ref());
        let capture = order
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.as_ref())
            .and_then(|payments| payments.captures.first());

        let status = match capture.map(|c| c.status.as_str()) {
            Some("DECLINED") | Some("FAILED") => ProviderStatus::Failed,
            _ => Self::order_status(&order.status),
        };

        ProviderPaymentStatus {
            status,
            amount: unit_amount.and_then(|a| Decimal::from_str(&a.value).ok()),
            currency: unit_amount.and_then(|a| a.currency_code.parse().ok()),
            payment_method: Some(PaymentMethod::PayPalWallet),
            completed_at: capture.and_then(|c| c.create_time),
            error_message: match status {
                ProviderStatus::Failed => Some("PayPal capture was declined".to_string()),
                _ => None,
            },
        }
    }
}

#[async_trait]
impl PaymentStrategy for PayPalStrategy {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::WalletProvider
    }

    fn supports_currency(&self, currency: Currency) -> bool {
        matches!(currency, Currency::USD | Currency::EUR | Currency::GBP)
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionResult> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders", self.base_url);

        let order_request = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": params.product_type.to_string(),
                "custom_id": params.user_id.to_string(),
                "description": params.product_type.display_name(),
                "amount": {
                    "currency_code": params.amount.currency().to_string(),
                    "value": format!("{:.2}", params.amount.amount()),
                }
            }],
            "application_context": {
                "brand_name": "Careera",
                "user_action": "PAY_NOW",
                "shipping_preference": "NO_SHIPPING",
                "return_url": params.success_url,
                "cancel_url": params.cancel_url,
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&order_request)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        let order: PayPalOrder = read_json(VENDOR, response).await?;

        let checkout_url = order
            .links
            .iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.clone())
            .ok_or_else(|| AppError::provider("PayPal order response has no approval link"))?;

        debug!(order_id = %order.id, "PayPal order created");

        let mut provider_metadata = HashMap::new();
        provider_metadata.insert("order_status".to_string(), order.status.clone());

        Ok(SessionResult {
            provider_reference: order.id,
            checkout_url,
            expires_at: Utc::now() + Self::session_ttl(),
            provider_metadata,
        })
    }

    /// PayPal signs deliveries with `PAYPAL-TRANSMISSION-SIG` over a
    /// certificate chain, which this check does not implement. Deployments
    /// put a relay in front that checks PayPal's signature and forwards the
    /// unchanged body with a hex HMAC-SHA256 of it under the webhook secret.
    /// Without the relay PayPal payments still settle through polling.
    fn verify_webhook_signature(&self, payload: &str, signature: &str, secret: &str) -> bool {
        verify_hmac_sha256_hex(secret.as_bytes(), payload.as_bytes(), signature)
    }

    fn parse_webhook_payload(&self, payload: &str) -> Result<WebhookPaymentInfo> {
        let event: PayPalEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::integrity(format!("Malformed PayPal webhook: {}", e)))?;

        let status = match event.event_type.as_str() {
            "CHECKOUT.ORDER.COMPLETED" | "PAYMENT.CAPTURE.COMPLETED" => ProviderStatus::Completed,
            "CHECKOUT.ORDER.APPROVED" => ProviderStatus::Processing,
            "PAYMENT.CAPTURE.DENIED" => ProviderStatus::Failed,
            "CHECKOUT.ORDER.VOIDED" => ProviderStatus::Cancelled,
            _ => ProviderStatus::Ignored,
        };

        let resource = event.resource;

        // Capture events carry the capture; the order id sits in related_ids
        let provider_reference = if event.event_type.starts_with("PAYMENT.CAPTURE.") {
            resource
                .supplementary_data
                .as_ref()
                .and_then(|data| data.related_ids.order_id.clone())
                .unwrap_or_default()
        } else {
            resource.id.clone()
        };

        let amount = resource.amount.as_ref().or_else(|| {
            resource
                .purchase_units
                .first()
                .and_then(|unit| unit.amount.as_ref())
        });

        let mut metadata = HashMap::new();
        metadata.insert("event_id".to_string(), event.id);
        if event.event_type.starts_with("PAYMENT.CAPTURE.") {
            metadata.insert("capture_id".to_string(), resource.id.clone());
        }

        Ok(WebhookPaymentInfo {
            provider_reference,
            status,
            amount: amount.and_then(|a| Decimal::from_str(&a.value).ok()),
            currency: amount.and_then(|a| a.currency_code.parse().ok()),
            payment_method: Some(PaymentMethod::PayPalWallet),
            error_message: match status {
                ProviderStatus::Failed => Some("PayPal capture was denied".to_string()),
                _ => None,
            },
            metadata,
        })
    }

    async fn get_payment_status(&self, provider_reference: &str) -> Result<ProviderPaymentStatus> {
        let order = self.fetch_order(provider_reference).await?;

        let order = if order.status == "APPROVED" {
            self.capture_order(provider_reference).await?
        } else {
            order
        };

        Ok(Self::order_to_status(&order))
    }

    async fn process_refund(&self, params: RefundParams) -> Result<RefundResult> {
        let order = self.fetch_order(&params.provider_reference).await?;
        let Some(capture_id) = order
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.as_ref())
            .and_then(|payments| payments.captures.first())
            .map(|capture| capture.id.clone())
        else {
            return Ok(RefundResult::rejected("PayPal order has no capture to refund"));
        };

        let token = self.access_token().await?;
        let url = format!(
            "{}/v2/payments/captures/{}/refund",
            self.base_url, capture_id
        );
        let note: String = params.reason.chars().take(255).collect();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("PayPal-Request-Id", &params.idempotency_key)
            .json(&json!({
                "amount": {
                    "currency_code": params.amount.currency().to_string(),
                    "value": format!("{:.2}", params.amount.amount()),
                },
                "note_to_payer": note,
            }))
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        let refund: PayPalRefund = match read_json(VENDOR, response).await {
            Ok(refund) => refund,
            Err(e) if is_rejection(&e) => return Ok(RefundResult::rejected(e.to_string())),
            Err(e) => return Err(e),
        };

        match refund.status.as_str() {
            "COMPLETED" | "PENDING" => Ok(RefundResult::accepted(refund.id)),
            other => Ok(RefundResult::rejected(format!(
                "PayPal refund {} ended as {}",
                refund.id, other
            ))),
        }
    }
}

// PayPal API structures

#[derive(Debug, Deserialize)]
struct PayPalToken {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct PayPalOrder {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<PayPalLink>,
    #[serde(default)]
    purchase_units: Vec<PayPalPurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PayPalLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PayPalPurchaseUnit {
    amount: Option<PayPalAmount>,
    payments: Option<PayPalPayments>,
}

#[derive(Debug, Deserialize)]
struct PayPalAmount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PayPalPayments {
    #[serde(default)]
    captures: Vec<PayPalCapture>,
}

#[derive(Debug, Deserialize)]
struct PayPalCapture {
    id: String,
    status: String,
    create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PayPalEvent {
    #[serde(default)]
    id: String,
    event_type: String,
    resource: PayPalResource,
}

#[derive(Debug, Deserialize)]
struct PayPalResource {
    #[serde(default)]
    id: String,
    amount: Option<PayPalAmount>,
    #[serde(default)]
    purchase_units: Vec<PayPalPurchaseUnit>,
    supplementary_data: Option<PayPalSupplementaryData>,
}

#[derive(Debug, Deserialize)]
struct PayPalSupplementaryData {
    related_ids: PayPalRelatedIds,
}

#[derive(Debug, Deserialize)]
struct PayPalRelatedIds {
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayPalRefund {
    id: String,
    status: String,
}
