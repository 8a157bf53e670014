use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::{AppError, Currency, Result};
use crate::modules::identity::{IdentityService, SubscriptionActivation};
use crate::modules::pricing::{DiscountPolicy, PricingCatalog, ProductPricing};
use crate::modules::providers::{
    with_provider_timeout, CreateSessionParams, PaymentProvider, PaymentStrategy,
    ProviderInfo, ProviderPaymentStatus, ProviderStatus, StrategyFactory,
};
use crate::modules::transactions::models::{
    CreateSessionRequest, NewTransaction, PagedResult, PaymentHistoryItem,
    PaymentSessionResponse, PaymentStatistics, PaymentTransaction, PaymentVerificationResponse,
    TransactionResponse, TransactionStatus, VerifyPaymentRequest,
};
use crate::modules::transactions::repositories::TransactionStore;

const MAX_PAGE_SIZE: u32 = 100;

/// Deployment-level knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Upper bound for any single provider call
    pub provider_timeout: Duration,
    /// Enables force activation. Never set in production.
    pub allow_unsafe_operations: bool,
    pub webhook_secrets: HashMap<PaymentProvider, String>,
    pub discounts: DiscountPolicy,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(15),
            allow_unsafe_operations: false,
            webhook_secrets: HashMap::new(),
            discounts: DiscountPolicy::default(),
        }
    }
}

impl PaymentSettings {
    pub fn from_config(config: &Config) -> Self {
        let mut webhook_secrets = HashMap::new();
        if let Some(stripe) = &config.stripe {
            webhook_secrets.insert(PaymentProvider::CardGateway, stripe.webhook_secret.clone());
        }
        if let Some(paypal) = &config.paypal {
            webhook_secrets.insert(PaymentProvider::WalletProvider, paypal.webhook_secret.clone());
        }
        if let Some(paymob) = &config.paymob {
            webhook_secrets.insert(PaymentProvider::RegionalGateway, paymob.hmac_secret.clone());
        }

        Self {
            provider_timeout: Duration::from_secs(config.payments.provider_timeout_secs),
            allow_unsafe_operations: config.payments.allow_unsafe_operations,
            webhook_secrets,
            discounts: config.payments.discounts.clone(),
        }
    }
}

/// Payment orchestrator
///
/// Owns the transaction state machine. Session creation, client polls,
/// provider webhooks and the reconciliation sweep all funnel through here.
pub struct PaymentService {
    store: Arc<dyn TransactionStore>,
    factory: Arc<StrategyFactory>,
    identity: Arc<dyn IdentityService>,
    pricing: PricingCatalog,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        factory: Arc<StrategyFactory>,
        identity: Arc<dyn IdentityService>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            factory,
            identity,
            pricing: PricingCatalog::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn strategy_for(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentStrategy>> {
        self.factory.resolve(provider)
    }

    /// Open a checkout session with the chosen provider and record it as Pending
    pub async fn create_payment_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<PaymentSessionResponse> {
        if request.user_id <= 0 {
            return Err(AppError::validation("User id must be positive"));
        }
        validate_redirect_url("success_url", &request.success_url)?;
        validate_redirect_url("cancel_url", &request.cancel_url)?;

        if !self.factory.is_supported(request.provider) {
            return Err(AppError::validation(format!(
                "Payment provider '{}' is not available",
                request.provider
            )));
        }
        let strategy = self.factory.resolve(request.provider)?;

        if !strategy.supports_currency(request.currency) {
            return Err(AppError::validation(format!(
                "{} does not support {}",
                request.provider.vendor(),
                request.currency
            )));
        }

        let billing_cycle = request
            .billing_cycle
            .unwrap_or_else(|| request.product_type.default_billing_cycle());
        let price = self
            .pricing
            .price(request.product_type, request.currency, billing_cycle)?;
        let priced = self
            .settings
            .discounts
            .apply(price, request.discount_code.as_deref())?;

        let profile = self.identity.customer_profile(request.user_id).await?;

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), request.user_id.to_string());
        metadata.insert("product_type".to_string(), request.product_type.to_string());
        metadata.insert("billing_cycle".to_string(), billing_cycle.to_string());

        info!(
            provider = %request.provider,
            user_id = request.user_id,
            product_type = %request.product_type,
            amount = %priced.amount,
            "Creating payment session"
        );

        let session = with_provider_timeout(
            self.settings.provider_timeout,
            request.provider,
            "session creation",
            strategy.create_session(CreateSessionParams {
                user_id: request.user_id,
                amount: priced.amount,
                product_type: request.product_type,
                billing_cycle,
                customer_email: profile.email,
                customer_name: profile.full_name,
                success_url: request.success_url,
                cancel_url: request.cancel_url,
                metadata,
            }),
        )
        .await
        .map_err(|e| {
            error!(provider = %request.provider, error = %e, "Failed to create payment session");
            e
        })?;

        let transaction = PaymentTransaction::new(NewTransaction {
            user_id: request.user_id,
            provider: request.provider,
            provider_reference: session.provider_reference,
            product_type: request.product_type,
            billing_cycle,
            amount: priced.amount,
            original_amount: priced.original_amount,
            discount_code: priced.discount_code,
            checkout_url: session.checkout_url,
            expires_at: session.expires_at,
            provider_metadata: session.provider_metadata,
        })?;

        self.store.insert(&transaction).await?;

        info!(
            transaction_id = %transaction.id,
            provider_reference = %transaction.provider_reference,
            "Payment session created"
        );

        Ok(PaymentSessionResponse::from(&transaction))
    }

    /// Bring a transaction up to date with its provider.
    ///
    /// With a signature and webhook body the body is authenticated and used
    /// as the provider's answer; otherwise the provider is polled. Terminal
    /// transactions are returned as stored, except a Completed payment whose
    /// subscription was never linked, which gets its activation retried.
    ///
    /// Only a Pending session lapses on the clock. Once the provider has
    /// reported the payment in flight the row waits for a provider verdict.
    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
    ) -> Result<PaymentVerificationResponse> {
        let reference = request.provider_reference.trim();
        if reference.is_empty() {
            return Err(AppError::validation("Provider reference is required"));
        }

        let transaction = self.load_for_verification(reference).await?;
        let strategy = self.factory.resolve(transaction.provider)?;

        let reported = match request.webhook() {
            Some((signature, payload)) => {
                self.authenticate_webhook(&*strategy, payload, signature)?;
                let info = strategy.parse_webhook_payload(payload)?;
                if info.provider_reference != transaction.provider_reference {
                    warn!(
                        transaction_id = %transaction.id,
                        payload_reference = %info.provider_reference,
                        "Webhook body belongs to a different payment"
                    );
                    return Err(AppError::integrity(
                        "Webhook payload does not match the payment reference",
                    ));
                }
                Some((ProviderPaymentStatus::from(info), payload.to_string()))
            }
            None => None,
        };

        if transaction.status.is_terminal() {
            if transaction.needs_activation() {
                warn!(
                    transaction_id = %transaction.id,
                    "Completed payment has no subscription, retrying activation"
                );
                return self.activate_subscription(transaction).await;
            }
            debug!(
                transaction_id = %transaction.id,
                status = %transaction.status,
                "Payment already settled"
            );
            return Ok(PaymentVerificationResponse::from_transaction(&transaction, None));
        }

        let now = Utc::now();
        if transaction.lapses_at(now) {
            return self.expire(transaction, &[TransactionStatus::Pending]).await;
        }

        // Claim the row so a parallel caller sees the verification in flight
        let prior = transaction.status;
        let mut working = transaction.clone();
        let claimed = if prior == TransactionStatus::Verifying {
            false
        } else {
            working.mark_verifying(now);
            if self
                .store
                .transition(
                    &working,
                    &[TransactionStatus::Pending, TransactionStatus::Processing],
                )
                .await?
            {
                true
            } else {
                let current = self.reload(&transaction.id).await?;
                if current.status.is_terminal() {
                    return Ok(PaymentVerificationResponse::from_transaction(&current, None));
                }
                working = current;
                false
            }
        };

        let outcome = match reported {
            Some((status, payload)) => Ok((status, Some(payload))),
            None => with_provider_timeout(
                self.settings.provider_timeout,
                transaction.provider,
                "status check",
                strategy.get_payment_status(&transaction.provider_reference),
            )
            .await
            .map(|status| (status, None)),
        };

        let (status, payload) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    transaction_id = %transaction.id,
                    provider = %transaction.provider,
                    error = %e,
                    "Provider status check failed"
                );
                if claimed {
                    self.release_claim(&working, prior).await;
                }
                return Err(e);
            }
        };

        self.apply_provider_status(working, prior, claimed, status, payload)
            .await
    }

    async fn apply_provider_status(
        &self,
        working: PaymentTransaction,
        prior: TransactionStatus,
        claimed: bool,
        reported: ProviderPaymentStatus,
        payload: Option<String>,
    ) -> Result<PaymentVerificationResponse> {
        let now = Utc::now();
        let mut next = working.clone();

        match reported.status {
            ProviderStatus::Completed => {
                if let Err(e) = check_reported_amount(&working, &reported) {
                    error!(
                        transaction_id = %working.id,
                        reported_amount = ?reported.amount,
                        reported_currency = ?reported.currency,
                        "Provider reported a different amount than was charged"
                    );
                    if claimed {
                        self.release_claim(&working, prior).await;
                    }
                    return Err(e);
                }
                next.mark_completed(
                    reported.completed_at.unwrap_or(now),
                    reported.payment_method,
                    now,
                );
            }
            ProviderStatus::Failed => next.mark_failed(
                reported
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Payment failed".to_string()),
                "provider_declined",
                now,
            ),
            ProviderStatus::Cancelled => next.mark_cancelled(now),
            ProviderStatus::Expired => next.mark_expired(now),
            ProviderStatus::Processing => next.mark_processing(now),
            ProviderStatus::Pending | ProviderStatus::Ignored => {
                if claimed {
                    self.release_claim(&working, prior).await;
                } else if reported.status == ProviderStatus::Pending
                    && working.status == TransactionStatus::Verifying
                    && working.is_expired_at(now)
                {
                    // claim abandoned on a session the provider never saw paid
                    return self.expire(working, &[TransactionStatus::Verifying]).await;
                }
                let current = self.reload(&working.id).await?;
                return Ok(PaymentVerificationResponse::from_transaction(&current, None));
            }
        }

        if payload.is_some() {
            next.webhook_payload = payload;
        }

        if !self.store.transition(&next, &TransactionStatus::OPEN).await? {
            let current = self.reload(&next.id).await?;
            debug!(
                transaction_id = %next.id,
                status = %current.status,
                "Another verification settled the payment first"
            );
            return Ok(PaymentVerificationResponse::from_transaction(&current, None));
        }

        info!(
            transaction_id = %next.id,
            provider_reference = %next.provider_reference,
            status = %next.status,
            "Payment status updated"
        );

        if next.status == TransactionStatus::Completed {
            return self.activate_subscription(next).await;
        }

        Ok(PaymentVerificationResponse::from_transaction(&next, None))
    }

    /// Runs for the call that won the Completed transition, and again for any
    /// later verification while the subscription is still unlinked. The
    /// identity service treats `transaction_id` as the idempotency key.
    async fn activate_subscription(
        &self,
        transaction: PaymentTransaction,
    ) -> Result<PaymentVerificationResponse> {
        let subscription_id = self
            .identity
            .activate_subscription(SubscriptionActivation {
                user_id: transaction.user_id,
                transaction_id: transaction.id.clone(),
                product_type: transaction.product_type,
                billing_cycle: transaction.billing_cycle,
            })
            .await
            .map_err(|e| {
                error!(
                    transaction_id = %transaction.id,
                    user_id = transaction.user_id,
                    error = %e,
                    "Payment completed but subscription activation failed"
                );
                e
            })?;

        let mut linked = transaction;
        linked.link_subscription(subscription_id, Utc::now());
        if !self
            .store
            .transition(&linked, &[TransactionStatus::Completed])
            .await?
        {
            warn!(
                transaction_id = %linked.id,
                subscription_id,
                "Transaction left Completed before the subscription could be linked"
            );
        }

        let token = match self.identity.issue_token(linked.user_id).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(user_id = linked.user_id, error = %e, "Failed to issue refreshed token");
                None
            }
        };

        info!(
            transaction_id = %linked.id,
            user_id = linked.user_id,
            subscription_id,
            "Subscription activated"
        );

        Ok(PaymentVerificationResponse::from_transaction(&linked, token))
    }

    async fn expire(
        &self,
        transaction: PaymentTransaction,
        expected: &[TransactionStatus],
    ) -> Result<PaymentVerificationResponse> {
        let mut expired = transaction.clone();
        expired.mark_expired(Utc::now());

        if self.store.transition(&expired, expected).await?
        {
            info!(transaction_id = %expired.id, "Payment session expired");
            return Ok(PaymentVerificationResponse::from_transaction(&expired, None));
        }

        let current = self.reload(&transaction.id).await?;
        Ok(PaymentVerificationResponse::from_transaction(&current, None))
    }

    async fn release_claim(&self, working: &PaymentTransaction, prior: TransactionStatus) {
        let mut reverted = working.clone();
        reverted.release_claim(prior, Utc::now());

        if let Err(e) = self
            .store
            .transition(&reverted, &[TransactionStatus::Verifying])
            .await
        {
            error!(
                transaction_id = %working.id,
                error = %e,
                "Failed to release verification claim"
            );
        }
    }

    async fn reload(&self, id: &str) -> Result<PaymentTransaction> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment transaction '{}'", id)))
    }

    async fn load_for_verification(&self, reference: &str) -> Result<PaymentTransaction> {
        if let Some(transaction) = self.store.find_by_reference(reference).await? {
            return Ok(transaction);
        }
        self.store.find_by_id(reference).await?.ok_or_else(|| {
            AppError::not_found(format!(
                "Payment transaction with reference '{}'",
                reference
            ))
        })
    }

    /// Reject a webhook body unless its signature checks out under the
    /// provider's configured secret
    pub fn authenticate_webhook(
        &self,
        strategy: &dyn PaymentStrategy,
        payload: &str,
        signature: &str,
    ) -> Result<()> {
        let provider = strategy.provider();
        let secret = self
            .settings
            .webhook_secrets
            .get(&provider)
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                AppError::Configuration(format!("No webhook secret configured for {}", provider))
            })?;

        if !strategy.verify_webhook_signature(payload, signature, secret) {
            warn!(provider = %provider, "Rejected webhook with invalid signature");
            return Err(AppError::integrity("Invalid webhook signature"));
        }

        Ok(())
    }

    /// Reset a payment to Pending and run verification again.
    ///
    /// Only available when the deployment enables unsafe operations.
    pub async fn force_activate_payment(
        &self,
        payment_id: &str,
    ) -> Result<PaymentVerificationResponse> {
        if !self.settings.allow_unsafe_operations {
            return Err(AppError::forbidden(
                "Force activation is disabled in this environment",
            ));
        }

        let transaction = self.reload(payment_id).await?;
        if transaction.status == TransactionStatus::Refunded {
            return Err(AppError::validation(
                "Refunded payments cannot be force activated",
            ));
        }

        let mut reset = transaction.clone();
        reset.reset_to_pending(Utc::now());
        let resettable: Vec<TransactionStatus> = TransactionStatus::ALL
            .into_iter()
            .filter(|status| *status != TransactionStatus::Refunded)
            .collect();

        if !self.store.transition(&reset, &resettable).await? {
            return Err(AppError::conflict(
                "Payment changed while it was being reset",
            ));
        }

        warn!(
            transaction_id = %transaction.id,
            previous_status = %transaction.status,
            "Force activating payment"
        );

        self.verify_payment(VerifyPaymentRequest::poll(transaction.provider_reference))
            .await
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<TransactionResponse> {
        Ok(self.reload(payment_id).await?.into())
    }

    pub async fn get_user_payment_history(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<PaymentHistoryItem>> {
        if page == 0 {
            return Err(AppError::validation("Page must be at least 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let total = self.store.count_by_user(user_id).await?;
        let offset = (page - 1).saturating_mul(page_size);
        let items = self
            .store
            .find_by_user(user_id, page_size, offset)
            .await?
            .into_iter()
            .map(PaymentHistoryItem::from)
            .collect();

        Ok(PagedResult::new(items, total, page, page_size))
    }

    pub async fn get_payment_statistics(&self, currency: Currency) -> Result<PaymentStatistics> {
        let transactions = self.store.find_by_currency(currency).await?;
        Ok(PaymentStatistics::from_transactions(currency, &transactions))
    }

    pub fn list_products(&self, currency: Currency) -> Vec<ProductPricing> {
        self.pricing.list_products(currency)
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.factory.list_providers()
    }
}

fn validate_redirect_url(field: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{} must be an absolute http(s) URL",
            field
        )))
    }
}

/// A success report must match what was charged
fn check_reported_amount(
    transaction: &PaymentTransaction,
    reported: &ProviderPaymentStatus,
) -> Result<()> {
    if let Some(currency) = reported.currency {
        if currency != transaction.currency {
            return Err(AppError::integrity(format!(
                "Provider reported {} but the payment was charged in {}",
                currency, transaction.currency
            )));
        }
    }

    if let Some(amount) = reported.amount {
        if amount != transaction.amount {
            return Err(AppError::integrity(format!(
                "Provider reported {} but the payment was charged {}",
                transaction.currency.format_amount(amount),
                transaction.display_amount()
            )));
        }
    }

    Ok(())
}
