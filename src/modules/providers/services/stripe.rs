use super::http::{build_client, is_rejection, read_json, transport_error};
use super::signature::verify_hmac_sha256_hex;
use super::strategy::{
    CreateSessionParams, PaymentStrategy, ProviderPaymentStatus, ProviderStatus, RefundParams,
    RefundResult, SessionResult, WebhookPaymentInfo,
};
use crate::config::StripeConfig;
use crate::core::{AppError, Currency, Result};
use crate::modules::providers::models::{PaymentMethod, PaymentProvider};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const VENDOR: &str = "Stripe";

/// Stripe Checkout client for the card gateway
///
/// API Documentation: https://docs.stripe.com/api/checkout/sessions
pub struct StripeStrategy {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeStrategy {
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Checkout sessions stay open for a day
    pub fn session_ttl() -> ChronoDuration {
        ChronoDuration::hours(24)
    }

    fn session_form(params: &CreateSessionParams) -> Vec<(String, String)> {
        let currency = params.amount.currency();
        let unit_amount = currency.to_minor_units(params.amount.amount());
        let interval = params.billing_cycle.recurring_interval();

        let mut form: Vec<(String, String)> = vec![
            (
                "mode".into(),
                if interval.is_some() { "subscription" } else { "payment" }.into(),
            ),
            ("success_url".into(), params.success_url.clone()),
            ("cancel_url".into(), params.cancel_url.clone()),
            ("customer_email".into(), params.customer_email.clone()),
            ("client_reference_id".into(), params.user_id.to_string()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                currency.to_string().to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                params.product_type.display_name().into(),
            ),
            (
                "line_items[0][price_data][product_data][description]".into(),
                params.product_type.description().into(),
            ),
        ];

        if let Some(interval) = interval {
            form.push((
                "line_items[0][price_data][recurring][interval]".into(),
                interval.into(),
            ));
        }

        for (key, value) in &params.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        form
    }

    async fn fetch_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        self.get(&format!("/v1/checkout/sessions/{}", session_id), &[])
            .await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        read_json(VENDOR, response).await
    }

    /// The payment behind a checkout session.
    ///
    /// Payment-mode sessions carry the payment intent directly. Subscription
    /// sessions leave it null and the charge hangs off the first invoice.
    async fn refund_target(&self, session_id: &str) -> Result<Option<RefundTarget>> {
        let session: StripeCheckoutSession = self
            .get(
                &format!("/v1/checkout/sessions/{}", session_id),
                &[("expand[]", "invoice")],
            )
            .await?;

        if let Some(payment_intent) = session.payment_intent {
            return Ok(Some(RefundTarget::PaymentIntent(payment_intent)));
        }

        let invoice = match session.invoice {
            Some(Expandable::Object(invoice)) => invoice,
            Some(Expandable::Id(invoice_id)) => {
                self.get(&format!("/v1/invoices/{}", invoice_id), &[]).await?
            }
            None => return Ok(None),
        };

        Ok(invoice
            .payment_intent
            .map(RefundTarget::PaymentIntent)
            .or(invoice.charge.map(RefundTarget::Charge)))
    }

    /// `Stripe-Signature` carries `t=<unix>` and one or more `v1=<hex>` entries
    fn parse_signature_header(header: &str) -> Option<(&str, Vec<&str>)> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        match timestamp {
            Some(t) if !signatures.is_empty() => Some((t, signatures)),
            _ => None,
        }
    }
}

fn payment_method_from(types: &[String]) -> PaymentMethod {
    match types.first().map(String::as_str) {
        Some("card") => PaymentMethod::CreditCard,
        Some("paypal") => PaymentMethod::PayPalWallet,
        Some("us_bank_account") | Some("sepa_debit") => PaymentMethod::BankTransfer,
        _ => PaymentMethod::Unknown,
    }
}

fn parse_currency(code: Option<&str>) -> Option<Currency> {
    code.and_then(|c| c.parse().ok())
}

fn amount_from_minor(currency: Option<Currency>, minor: Option<i64>) -> Option<Decimal> {
    match (currency, minor) {
        (Some(currency), Some(minor)) => Some(currency.from_minor_units(minor)),
        _ => None,
    }
}

#[async_trait]
impl PaymentStrategy for StripeStrategy {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::CardGateway
    }

    fn supports_currency(&self, _currency: Currency) -> bool {
        true
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionResult> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let form = Self::session_form(&params);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        let session: StripeCheckoutSession = read_json(VENDOR, response).await?;

        let checkout_url = session
            .url
            .clone()
            .ok_or_else(|| AppError::provider("Stripe session response has no checkout url"))?;

        let expires_at = session
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| Utc::now() + Self::session_ttl());

        debug!(session_id = %session.id, "Stripe checkout session created");

        let mut provider_metadata = HashMap::new();
        provider_metadata.insert("mode".to_string(), form[0].1.clone());

        Ok(SessionResult {
            provider_reference: session.id,
            checkout_url,
            expires_at,
            provider_metadata,
        })
    }

    fn verify_webhook_signature(&self, payload: &str, signature: &str, secret: &str) -> bool {
        let Some((timestamp, candidates)) = Self::parse_signature_header(signature) else {
            return false;
        };

        let signed_payload = format!("{}.{}", timestamp, payload);
        candidates.iter().any(|candidate| {
            verify_hmac_sha256_hex(secret.as_bytes(), signed_payload.as_bytes(), candidate)
        })
    }

    fn parse_webhook_payload(&self, payload: &str) -> Result<WebhookPaymentInfo> {
        let event: StripeEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::integrity(format!("Malformed Stripe webhook: {}", e)))?;

        let session: StripeCheckoutSession = match event.data.object.get("object") {
            Some(serde_json::Value::String(kind)) if kind == "checkout.session" => {
                serde_json::from_value(event.data.object.clone()).map_err(|e| {
                    AppError::integrity(format!("Malformed Stripe checkout session: {}", e))
                })?
            }
            _ => return Ok(WebhookPaymentInfo::ignored("")),
        };

        let status = match event.event_type.as_str() {
            "checkout.session.completed" => match session.payment_status.as_deref() {
                Some("paid") | Some("no_payment_required") => ProviderStatus::Completed,
                _ => ProviderStatus::Processing,
            },
            "checkout.session.async_payment_succeeded" => ProviderStatus::Completed,
            "checkout.session.async_payment_failed" => ProviderStatus::Failed,
            "checkout.session.expired" => ProviderStatus::Expired,
            _ => ProviderStatus::Ignored,
        };

        let currency = parse_currency(session.currency.as_deref());
        let error_message = match status {
            ProviderStatus::Failed => Some("Asynchronous payment failed".to_string()),
            _ => None,
        };

        Ok(WebhookPaymentInfo {
            provider_reference: session.id,
            status,
            amount: amount_from_minor(currency, session.amount_total),
            currency,
            payment_method: Some(payment_method_from(&session.payment_method_types)),
            error_message,
            metadata: session.metadata,
        })
    }

    async fn get_payment_status(&self, provider_reference: &str) -> Result<ProviderPaymentStatus> {
        let session = self.fetch_session(provider_reference).await?;

        let status = match (session.status.as_deref(), session.payment_status.as_deref()) {
            (Some("complete"), Some("paid")) | (Some("complete"), Some("no_payment_required")) => {
                ProviderStatus::Completed
            }
            (Some("complete"), _) => ProviderStatus::Processing,
            (Some("expired"), _) => ProviderStatus::Expired,
            _ => ProviderStatus::Pending,
        };

        let currency = parse_currency(session.currency.as_deref());

        Ok(ProviderPaymentStatus {
            status,
            amount: amount_from_minor(currency, session.amount_total),
            currency,
            payment_method: Some(payment_method_from(&session.payment_method_types)),
            completed_at: None,
            error_message: None,
        })
    }

    async fn process_refund(&self, params: RefundParams) -> Result<RefundResult> {
        let Some(target) = self.refund_target(&params.provider_reference).await? else {
            return Ok(RefundResult::rejected(
                "Checkout session has no payment to refund",
            ));
        };

        let amount = params.amount.currency().to_minor_units(params.amount.amount());
        let reason: String = params.reason.chars().take(500).collect();
        let form = vec![
            target.form_field(),
            ("amount".to_string(), amount.to_string()),
            ("reason".to_string(), "requested_by_customer".to_string()),
            ("metadata[reason]".to_string(), reason),
        ];

        let url = format!("{}/v1/refunds", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(VENDOR, e))?;

        let refund: StripeRefund = match read_json(VENDOR, response).await {
            Ok(refund) => refund,
            Err(e) if is_rejection(&e) => return Ok(RefundResult::rejected(e.to_string())),
            Err(e) => return Err(e),
        };

        match refund.status.as_str() {
            "succeeded" | "pending" => Ok(RefundResult::accepted(refund.id)),
            other => Ok(RefundResult::rejected(format!(
                "Stripe refund {} ended as {}",
                refund.id, other
            ))),
        }
    }
}

// Stripe API structures

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
    status: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    expires_at: Option<i64>,
    payment_intent: Option<String>,
    invoice: Option<Expandable<StripeInvoice>>,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// A field Stripe returns as an id unless it was expanded
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Id(String),
    Object(T),
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    payment_intent: Option<String>,
    charge: Option<String>,
}

#[derive(Debug, PartialEq)]
enum RefundTarget {
    PaymentIntent(String),
    Charge(String),
}

impl RefundTarget {
    fn form_field(self) -> (String, String) {
        match self {
            RefundTarget::PaymentIntent(id) => ("payment_intent".to_string(), id),
            RefundTarget::Charge(id) => ("charge".to_string(), id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
}
