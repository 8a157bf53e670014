use super::http::{build_client, is_rejection, read_json, transport_error};
use super::signature::verify_hmac_sha512_hex;
use super::strategy::{
    CreateSessionParams, PaymentStrategy, ProviderPaymentStatus, ProviderStatus, RefundParams,
    RefundResult, SessionResult, WebhookPaymentInfo,
};
use crate::config::PaymobConfig;
use crate::core::{AppError, Currency, Result};
use crate::modules::providers::models::{PaymentMethod, PaymentProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const VENDOR: &str = "Paymob";

/// Transaction fields covered by the callback HMAC, in signing order
const HMAC_FIELDS: [&str; 20] = [
    "/amount_cents",
    "/created_at",
    "/currency",
    "/error_occured",
    "/has_parent_transaction",
    "/id",
    "/integration_id",
    "/is_3d_secure",
    "/is_auth",
    "/is_capture",
    "/is_refunded",
    "/is_standalone_payment",
    "/is_voided",
    "/order/id",
    "/owner",
    "/pending",
    "/source_data/pan",
    "/source_data/sub_type",
    "/source_data/type",
    "/success",
];

/// Paymob Accept client for the regional gateway
///
/// API Documentation: https://developers.paymob.com/egypt/accept-standard-redirect
pub struct PaymobStrategy {
    client: Client,
    api_key: String,
    integration_id: i64,
    iframe_id: i64,
    base_url: String,
}

impl PaymobStrategy {
    pub fn new(config: &PaymobConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: config.api_key.clone(),
            integration_id: config.integration_id,
            iframe_id: config.iframe_id,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Payment keys are issued for two hours
    pub fn session_ttl() -> ChronoDuration {
        ChronoDuration::hours(2)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        read_json(VENDOR, response).await
    }

    async fn auth_token(&self) -> Result<String> {
        let auth: PaymobToken = self
            .post_json("/api/auth/tokens", &json!({ "api_key": self.api_key }))
            .await?;
        Ok(auth.token)
    }

    /// Latest transaction for an order, `None` while the customer has not paid
    async fn inquire(&self, auth_token: &str, order_id: &str) -> Result<Option<PaymobTransaction>> {
        let order_id: i64 = order_id
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid Paymob order id: {}", order_id)))?;

        let url = format!("{}/api/ecommerce/orders/transaction_inquiry", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "auth_token": auth_token, "order_id": order_id }))
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        read_json(VENDOR, response).await.map(Some)
    }

    /// Concatenation of the signed fields as Paymob renders them
    fn hmac_message(transaction: &Value) -> String {
        HMAC_FIELDS
            .iter()
            .map(|pointer| match transaction.pointer(pointer) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::Number(n)) => n.to_string(),
                // Some payloads carry the order as a bare id
                None if *pointer == "/order/id" => match transaction.get("order") {
                    Some(Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                },
                _ => String::new(),
            })
            .collect()
    }

    fn transaction_status(transaction: &PaymobTransaction) -> ProviderStatus {
        if transaction.is_refunded || transaction.is_voided {
            ProviderStatus::Ignored
        } else if transaction.success {
            ProviderStatus::Completed
        } else if transaction.pending {
            ProviderStatus::Processing
        } else {
            ProviderStatus::Failed
        }
    }
}

fn payment_method(transaction: &PaymobTransaction) -> PaymentMethod {
    match transaction
        .source_data
        .as_ref()
        .and_then(|source| source.source_type.as_deref())
    {
        Some("card") => PaymentMethod::CreditCard,
        Some("wallet") => PaymentMethod::MobileWallet,
        _ => PaymentMethod::Unknown,
    }
}

fn error_message(transaction: &PaymobTransaction) -> Option<String> {
    transaction
        .data
        .as_ref()
        .and_then(|data| data.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some("Payment declined".to_string()))
}

/// Paymob timestamps come with or without an offset; the bare form is UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|ts| ts.and_utc())
        })
}

#[async_trait]
impl PaymentStrategy for PaymobStrategy {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::RegionalGateway
    }

    fn supports_currency(&self, currency: Currency) -> bool {
        matches!(currency, Currency::EGP)
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionResult> {
        let auth_token = self.auth_token().await?;
        let currency = params.amount.currency();
        let amount_cents = currency.to_minor_units(params.amount.amount());
        let merchant_order_id = uuid::Uuid::new_v4().to_string();

        let order: PaymobOrder = self
            .post_json(
                "/api/ecommerce/orders",
                &json!({
                    "auth_token": auth_token,
                    "delivery_needed": false,
                    "amount_cents": amount_cents,
                    "currency": currency.to_string(),
                    "merchant_order_id": merchant_order_id,
                    "items": [{
                        "name": params.product_type.display_name(),
                        "amount_cents": amount_cents,
                        "description": params.product_type.description(),
                        "quantity": 1
                    }]
                }),
            )
            .await?;

        let mut names = params.customer_name.split_whitespace();
        let first_name = names.next().unwrap_or("NA").to_string();
        let last_name = names.collect::<Vec<_>>().join(" ");
        let last_name = if last_name.is_empty() { "NA".to_string() } else { last_name };

        let payment_key: PaymobToken = self
            .post_json(
                "/api/acceptance/payment_keys",
                &json!({
                    "auth_token": auth_token,
                    "amount_cents": amount_cents,
                    "expiration": Self::session_ttl().num_seconds(),
                    "order_id": order.id,
                    "currency": currency.to_string(),
                    "integration_id": self.integration_id,
                    "billing_data": {
                        "email": params.customer_email,
                        "first_name": first_name,
                        "last_name": last_name,
                        "phone_number": "NA",
                        "apartment": "NA",
                        "floor": "NA",
                        "street": "NA",
                        "building": "NA",
                        "city": "NA",
                        "country": "EG",
                        "state": "NA",
                        "postal_code": "NA",
                        "shipping_method": "NA"
                    }
                }),
            )
            .await?;

        debug!(order_id = order.id, "Paymob order registered");

        let mut provider_metadata = HashMap::new();
        provider_metadata.insert("merchant_order_id".to_string(), merchant_order_id);
        provider_metadata.insert("integration_id".to_string(), self.integration_id.to_string());

        Ok(SessionResult {
            provider_reference: order.id.to_string(),
            checkout_url: format!(
                "{}/api/acceptance/iframes/{}?payment_token={}",
                self.base_url, self.iframe_id, payment_key.token
            ),
            expires_at: Utc::now() + Self::session_ttl(),
            provider_metadata,
        })
    }

    /// `signature` is the `hmac` query value of the callback
    fn verify_webhook_signature(&self, payload: &str, signature: &str, secret: &str) -> bool {
        let Ok(callback) = serde_json::from_str::<Value>(payload) else {
            return false;
        };
        let Some(transaction) = callback.get("obj") else {
            return false;
        };

        let message = Self::hmac_message(transaction);
        verify_hmac_sha512_hex(secret.as_bytes(), message.as_bytes(), signature)
    }

    fn parse_webhook_payload(&self, payload: &str) -> Result<WebhookPaymentInfo> {
        let callback: PaymobCallback = serde_json::from_str(payload)
            .map_err(|e| AppError::integrity(format!("Malformed Paymob callback: {}", e)))?;

        if callback.callback_type != "TRANSACTION" {
            return Ok(WebhookPaymentInfo::ignored(""));
        }

        let transaction: PaymobTransaction = serde_json::from_value(callback.obj)
            .map_err(|e| AppError::integrity(format!("Malformed Paymob transaction: {}", e)))?;

        let status = Self::transaction_status(&transaction);
        let currency: Option<Currency> = transaction.currency.parse().ok();

        let mut metadata = HashMap::new();
        metadata.insert("transaction_id".to_string(), transaction.id.to_string());
        if let Some(merchant_order_id) = transaction.order.merchant_order_id.clone() {
            metadata.insert("merchant_order_id".to_string(), merchant_order_id);
        }

        Ok(WebhookPaymentInfo {
            provider_reference: transaction.order.id.to_string(),
            status,
            amount: currency.map(|c| c.from_minor_units(transaction.amount_cents)),
            currency,
            payment_method: Some(payment_method(&transaction)),
            error_message: match status {
                ProviderStatus::Failed => error_message(&transaction),
                _ => None,
            },
            metadata,
        })
    }

    async fn get_payment_status(&self, provider_reference: &str) -> Result<ProviderPaymentStatus> {
        let auth_token = self.auth_token().await?;
        let Some(transaction) = self.inquire(&auth_token, provider_reference).await? else {
            return Ok(ProviderPaymentStatus {
                status: ProviderStatus::Pending,
                amount: None,
                currency: None,
                payment_method: None,
                completed_at: None,
                error_message: None,
            });
        };

        let status = match Self::transaction_status(&transaction) {
            // a refunded or voided transaction was paid at some point
            ProviderStatus::Ignored => ProviderStatus::Completed,
            other => other,
        };
        let currency: Option<Currency> = transaction.currency.parse().ok();

        Ok(ProviderPaymentStatus {
            status,
            amount: currency.map(|c| c.from_minor_units(transaction.amount_cents)),
            currency,
            payment_method: Some(payment_method(&transaction)),
            completed_at: match status {
                ProviderStatus::Completed => transaction.created_at.as_deref().and_then(parse_timestamp),
                _ => None,
            },
            error_message: match status {
                ProviderStatus::Failed => error_message(&transaction),
                _ => None,
            },
        })
    }

    /// Paymob has no idempotency header; the refund is keyed on the
    /// transaction, which Paymob refuses to over-refund
    async fn process_refund(&self, params: RefundParams) -> Result<RefundResult> {
        let auth_token = self.auth_token().await?;
        let Some(transaction) = self.inquire(&auth_token, &params.provider_reference).await? else {
            return Ok(RefundResult::rejected("Paymob order has no transaction to refund"));
        };

        let amount_cents = params.amount.currency().to_minor_units(params.amount.amount());
        let refund: PaymobTransaction = match self
            .post_json(
                "/api/acceptance/void_refund/refund",
                &json!({
                    "auth_token": auth_token,
                    "transaction_id": transaction.id,
                    "amount_cents": amount_cents
                }),
            )
            .await
        {
            Ok(refund) => refund,
            Err(e) if is_rejection(&e) => return Ok(RefundResult::rejected(e.to_string())),
            Err(e) => return Err(e),
        };

        if refund.success || refund.pending {
            Ok(RefundResult::accepted(refund.id.to_string()))
        } else {
            Ok(RefundResult::rejected(
                error_message(&refund).unwrap_or_else(|| "Paymob refund declined".to_string()),
            ))
        }
    }
}

// Paymob API structures

#[derive(Debug, Deserialize)]
struct PaymobToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct PaymobOrder {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PaymobCallback {
    #[serde(rename = "type")]
    callback_type: String,
    #[serde(default)]
    obj: Value,
}

#[derive(Debug, Deserialize)]
struct PaymobTransaction {
    id: i64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    pending: bool,
    #[serde(default)]
    amount_cents: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    is_refunded: bool,
    #[serde(default)]
    is_voided: bool,
    created_at: Option<String>,
    #[serde(default, deserialize_with = "order_ref")]
    order: PaymobOrderRef,
    source_data: Option<PaymobSourceData>,
    data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymobOrderRef {
    id: i64,
    merchant_order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymobSourceData {
    #[serde(rename = "type")]
    source_type: Option<String>,
}

/// Paymob sends the order either as an object or as a bare id
fn order_ref<'de, D>(deserializer: D) -> std::result::Result<PaymobOrderRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(i64),
        Full(PaymobOrderRef),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Id(id) => PaymobOrderRef {
            id,
            merchant_order_id: None,
        },
        Raw::Full(order) => order,
    })
}
