use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::payment_service::PaymentService;
use crate::core::{AppError, Result};
use crate::modules::providers::{PaymentProvider, ProviderStatus};
use crate::modules::transactions::models::{PaymentVerificationResponse, VerifyPaymentRequest};

/// What happened to an authenticated webhook
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed(PaymentVerificationResponse),
    /// Event type the platform does not act on
    Ignored,
    /// Signed by the provider but for a payment this platform never created
    UnknownReference { reference: String },
}

/// Entry point for provider-initiated notifications
///
/// Authentication happens before anything is looked up or parsed. Handling
/// is idempotent: providers redeliver, and a replay of an already applied
/// event returns the stored result without side effects.
#[derive(Clone)]
pub struct WebhookHandler {
    payments: Arc<PaymentService>,
}

impl WebhookHandler {
    pub fn new(payments: Arc<PaymentService>) -> Self {
        Self { payments }
    }

    pub async fn handle(
        &self,
        provider: PaymentProvider,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookOutcome> {
        let strategy = self.payments.strategy_for(provider)?;
        self.payments
            .authenticate_webhook(&*strategy, payload, signature)?;

        let info = strategy.parse_webhook_payload(payload)?;
        if info.status == ProviderStatus::Ignored {
            debug!(provider = %provider, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let reference = info.provider_reference.trim();
        if reference.is_empty() {
            return Err(AppError::integrity("Webhook payload has no payment reference"));
        }

        let Some(transaction) = self.payments.store().find_by_reference(reference).await? else {
            warn!(
                provider = %provider,
                reference = %reference,
                "Webhook for unknown payment reference"
            );
            return Ok(WebhookOutcome::UnknownReference {
                reference: reference.to_string(),
            });
        };

        if transaction.provider != provider {
            warn!(
                transaction_id = %transaction.id,
                expected = %transaction.provider,
                received = %provider,
                "Webhook delivered by the wrong provider"
            );
            return Err(AppError::integrity(
                "Webhook provider does not match the payment",
            ));
        }

        info!(
            provider = %provider,
            transaction_id = %transaction.id,
            status = ?info.status,
            "Processing webhook"
        );

        let response = self
            .payments
            .verify_payment(VerifyPaymentRequest::signed(
                transaction.provider_reference,
                signature,
                payload,
            ))
            .await?;

        Ok(WebhookOutcome::Processed(response))
    }
}
