// Scripted payment strategy
//
// Behaves like a provider whose answers are set by the test. Webhook
// signatures are hex HMAC-SHA256 of the body, and webhook bodies use a small
// JSON shape built by `webhook_body`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use careera_billing::core::{AppError, Currency, Result};
use careera_billing::providers::services::signature::{hmac_sha256_hex, verify_hmac_sha256_hex};
use careera_billing::providers::{
    CreateSessionParams, PaymentProvider, PaymentStrategy, ProviderPaymentStatus, ProviderStatus,
    RefundParams, RefundResult, SessionResult, WebhookPaymentInfo,
};

/// How the next refund call behaves
#[derive(Debug, Clone)]
pub enum RefundScript {
    Accept,
    Reject(String),
    Timeout,
}

pub struct ScriptedStrategy {
    provider: PaymentProvider,
    currencies: Vec<Currency>,
    status: Mutex<ProviderPaymentStatus>,
    status_error: Mutex<Option<String>>,
    status_delay: Mutex<Option<Duration>>,
    refund: Mutex<RefundScript>,
    session_ttl: Mutex<ChronoDuration>,
    sessions: AtomicUsize,
    status_calls: AtomicUsize,
    refund_calls: AtomicUsize,
    last_session: Mutex<Option<CreateSessionParams>>,
    last_refund: Mutex<Option<RefundParams>>,
}

impl ScriptedStrategy {
    pub fn new(provider: PaymentProvider, currencies: &[Currency]) -> Self {
        Self {
            provider,
            currencies: currencies.to_vec(),
            status: Mutex::new(provider_status(ProviderStatus::Pending, None, None)),
            status_error: Mutex::new(None),
            status_delay: Mutex::new(None),
            refund: Mutex::new(RefundScript::Accept),
            session_ttl: Mutex::new(ChronoDuration::hours(1)),
            sessions: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
            last_session: Mutex::new(None),
            last_refund: Mutex::new(None),
        }
    }

    pub fn card_gateway() -> Self {
        Self::new(
            PaymentProvider::CardGateway,
            &[Currency::USD, Currency::EUR, Currency::GBP, Currency::EGP, Currency::SAR],
        )
    }

    pub fn wallet() -> Self {
        Self::new(
            PaymentProvider::WalletProvider,
            &[Currency::USD, Currency::EUR, Currency::GBP],
        )
    }

    pub fn regional_gateway() -> Self {
        Self::new(PaymentProvider::RegionalGateway, &[Currency::EGP])
    }

    /// What `get_payment_status` answers from now on
    pub fn set_status(&self, status: ProviderStatus, amount: Option<Decimal>, currency: Option<Currency>) {
        *self.status.lock().unwrap() = provider_status(status, amount, currency);
        *self.status_error.lock().unwrap() = None;
    }

    pub fn fail_status_checks(&self, message: &str) {
        *self.status_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn delay_status_checks(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn script_refund(&self, script: RefundScript) {
        *self.refund.lock().unwrap() = script;
    }

    /// Sessions created after this call expire `ttl` from now
    pub fn set_session_ttl(&self, ttl: ChronoDuration) {
        *self.session_ttl.lock().unwrap() = ttl;
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<CreateSessionParams> {
        self.last_session.lock().unwrap().clone()
    }

    pub fn last_refund(&self) -> Option<RefundParams> {
        self.last_refund.lock().unwrap().clone()
    }
}

fn provider_status(
    status: ProviderStatus,
    amount: Option<Decimal>,
    currency: Option<Currency>,
) -> ProviderPaymentStatus {
    ProviderPaymentStatus {
        status,
        amount,
        currency,
        payment_method: None,
        completed_at: None,
        error_message: match status {
            ProviderStatus::Failed => Some("Card declined".to_string()),
            _ => None,
        },
    }
}

#[derive(Debug, Deserialize)]
struct ScriptedEvent {
    reference: String,
    status: ProviderStatus,
    amount: Option<Decimal>,
    currency: Option<Currency>,
}

#[async_trait]
impl PaymentStrategy for ScriptedStrategy {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn supports_currency(&self, currency: Currency) -> bool {
        self.currencies.contains(&currency)
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionResult> {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_session.lock().unwrap() = Some(params);
        let reference = format!("{}_{}_{}", self.provider.as_str(), n, uuid::Uuid::new_v4().simple());

        Ok(SessionResult {
            checkout_url: format!("https://checkout.test/{}", reference),
            provider_reference: reference,
            expires_at: Utc::now() + *self.session_ttl.lock().unwrap(),
            provider_metadata: HashMap::new(),
        })
    }

    fn verify_webhook_signature(&self, payload: &str, signature: &str, secret: &str) -> bool {
        verify_hmac_sha256_hex(secret.as_bytes(), payload.as_bytes(), signature)
    }

    fn parse_webhook_payload(&self, payload: &str) -> Result<WebhookPaymentInfo> {
        let event: ScriptedEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::integrity(format!("Malformed webhook payload: {}", e)))?;

        Ok(WebhookPaymentInfo {
            provider_reference: event.reference,
            status: event.status,
            amount: event.amount,
            currency: event.currency,
            payment_method: None,
            error_message: None,
            metadata: HashMap::new(),
        })
    }

    async fn get_payment_status(&self, _provider_reference: &str) -> Result<ProviderPaymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.status_error.lock().unwrap().clone() {
            return Err(AppError::provider(message));
        }

        Ok(self.status.lock().unwrap().clone())
    }

    async fn process_refund(&self, params: RefundParams) -> Result<RefundResult> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refund.lock().unwrap() = Some(params.clone());

        let script = self.refund.lock().unwrap().clone();
        match script {
            RefundScript::Accept => Ok(RefundResult::accepted(format!(
                "rf_{}",
                params.idempotency_key
            ))),
            RefundScript::Reject(reason) => Ok(RefundResult::rejected(reason)),
            RefundScript::Timeout => Err(AppError::ProviderTimeout(format!(
                "{} refund",
                self.provider
            ))),
        }
    }
}

/// Webhook body in the shape `ScriptedStrategy` parses
pub fn webhook_body(
    reference: &str,
    status: ProviderStatus,
    amount: Option<Decimal>,
    currency: Option<Currency>,
) -> String {
    json!({
        "reference": reference,
        "status": status,
        "amount": amount.map(|a| a.to_string()),
        "currency": currency,
    })
    .to_string()
}

pub fn sign(secret: &str, payload: &str) -> String {
    hmac_sha256_hex(secret.as_bytes(), payload.as_bytes())
}
