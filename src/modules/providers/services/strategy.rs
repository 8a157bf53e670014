use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Money, Result};
use crate::modules::pricing::{BillingCycle, ProductType};
use crate::modules::providers::models::{PaymentMethod, PaymentProvider};

/// One implementation per payment provider.
///
/// A strategy only talks to its provider and translates between the
/// provider's wire format and the canonical types below. It never touches
/// local state.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    fn supports_currency(&self, currency: Currency) -> bool;

    fn supported_currencies(&self) -> Vec<Currency> {
        Currency::ALL
            .into_iter()
            .filter(|currency| self.supports_currency(*currency))
            .collect()
    }

    /// Create a hosted checkout session and return where to send the customer
    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionResult>;

    /// Check a webhook signature against `secret`.
    ///
    /// Pure and deterministic: no I/O, malformed input yields `false`.
    fn verify_webhook_signature(&self, payload: &str, signature: &str, secret: &str) -> bool;

    /// Translate a raw webhook body into the canonical shape. Event types the
    /// platform does not act on come back as [`ProviderStatus::Ignored`].
    fn parse_webhook_payload(&self, payload: &str) -> Result<WebhookPaymentInfo>;

    /// Ask the provider for the current state of a payment
    async fn get_payment_status(&self, provider_reference: &str) -> Result<ProviderPaymentStatus>;

    async fn process_refund(&self, params: RefundParams) -> Result<RefundResult>;
}

/// Checkout request handed to a strategy
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub user_id: i64,
    pub amount: Money,
    pub product_type: ProductType,
    pub billing_cycle: BillingCycle,
    pub customer_email: String,
    pub customer_name: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// Provider's identifier for the session, the correlation key from now on
    pub provider_reference: String,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
    pub provider_metadata: HashMap<String, String>,
}

/// Payment state as reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// Event carries nothing the platform acts on
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPaymentInfo {
    pub provider_reference: String,
    pub status: ProviderStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub payment_method: Option<PaymentMethod>,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl WebhookPaymentInfo {
    pub fn ignored(provider_reference: impl Into<String>) -> Self {
        Self {
            provider_reference: provider_reference.into(),
            status: ProviderStatus::Ignored,
            amount: None,
            currency: None,
            payment_method: None,
            error_message: None,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentStatus {
    pub status: ProviderStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub payment_method: Option<PaymentMethod>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<WebhookPaymentInfo> for ProviderPaymentStatus {
    fn from(info: WebhookPaymentInfo) -> Self {
        Self {
            status: info.status,
            amount: info.amount,
            currency: info.currency,
            payment_method: info.payment_method,
            completed_at: None,
            error_message: info.error_message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefundParams {
    pub provider_reference: String,
    pub amount: Money,
    pub reason: String,
    /// Forwarded to providers that deduplicate retried refund calls
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub success: bool,
    pub refund_reference: Option<String>,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RefundResult {
    pub fn accepted(refund_reference: impl Into<String>) -> Self {
        Self {
            success: true,
            refund_reference: Some(refund_reference.into()),
            error_message: None,
            processed_at: Some(Utc::now()),
        }
    }

    pub fn rejected(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            refund_reference: None,
            error_message: Some(error_message.into()),
            processed_at: None,
        }
    }
}

/// Run a provider call under `limit`, mapping an overrun to
/// [`AppError::ProviderTimeout`]
pub async fn with_provider_timeout<T, F>(
    limit: Duration,
    provider: PaymentProvider,
    operation: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ProviderTimeout(format!(
            "{} {} did not answer within {}s",
            provider.vendor(),
            operation,
            limit.as_secs()
        ))),
    }
}
