use crate::core::{AppError, Currency, Money, Result};
use crate::modules::pricing::{BillingCycle, ProductType};
use crate::modules::providers::{PaymentMethod, PaymentProvider};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Payment transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Checkout session created, waiting for the customer
    Pending,
    /// Provider reports the payment in flight
    Processing,
    /// A verification call is in flight
    Verifying,
    /// Payment captured
    Completed,
    /// Provider declined the payment
    Failed,
    /// Customer or provider cancelled
    Cancelled,
    /// Session lapsed before a result arrived
    Expired,
    /// Money returned through the refund workflow
    Refunded,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 8] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Verifying,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
        TransactionStatus::Expired,
        TransactionStatus::Refunded,
    ];

    /// States a verification may still move forward from
    pub const OPEN: [TransactionStatus; 3] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Verifying,
    ];

    /// No further provider-driven transition is possible.
    ///
    /// `Completed` can still become `Refunded`, but only through the refund
    /// workflow.
    pub fn is_terminal(&self) -> bool {
        !Self::OPEN.contains(self)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Processing => write!(f, "processing"),
            TransactionStatus::Verifying => write!(f, "verifying"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Cancelled => write!(f, "cancelled"),
            TransactionStatus::Expired => write!(f, "expired"),
            TransactionStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid transaction status: {}", s))
    }
}

/// Payment transaction record
///
/// One row per checkout session. `provider_reference` is the provider's id
/// for the session, unique across all rows and never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentTransaction {
    pub id: String,
    pub user_id: i64,
    pub subscription_id: Option<i64>,

    pub provider: PaymentProvider,
    pub provider_reference: String,

    pub product_type: ProductType,
    pub billing_cycle: Option<BillingCycle>,

    pub amount: Decimal,
    pub currency: Currency,
    /// Price before a discount code was applied
    pub original_amount: Option<Decimal>,
    pub discount_code: Option<String>,
    pub tax_amount: Option<Decimal>,

    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<String>,
    pub refund_reference: Option<String>,
    pub refund_reason: Option<String>,

    pub checkout_url: Option<String>,
    pub receipt_url: Option<String>,
    /// Raw webhook body, stored verbatim
    pub webhook_payload: Option<String>,
    #[sqlx(json)]
    pub provider_metadata: HashMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
}

/// Everything known about a transaction when its checkout session is created
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub provider: PaymentProvider,
    pub provider_reference: String,
    pub product_type: ProductType,
    pub billing_cycle: BillingCycle,
    pub amount: Money,
    pub original_amount: Option<Money>,
    pub discount_code: Option<String>,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
    pub provider_metadata: HashMap<String, String>,
}

impl PaymentTransaction {
    /// Create a pending transaction for a freshly opened checkout session
    pub fn new(new: NewTransaction) -> Result<Self> {
        if new.provider_reference.trim().is_empty() {
            return Err(AppError::validation(
                "Provider reference cannot be empty".to_string(),
            ));
        }

        if let Some(original) = &new.original_amount {
            if original.currency() != new.amount.currency() {
                return Err(AppError::validation(
                    "Original amount must be in the payment currency".to_string(),
                ));
            }
        }

        let now = Utc::now();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            subscription_id: None,
            provider: new.provider,
            provider_reference: new.provider_reference,
            product_type: new.product_type,
            billing_cycle: Some(new.billing_cycle),
            amount: new.amount.amount(),
            currency: new.amount.currency(),
            original_amount: new.original_amount.map(|m| m.amount()),
            discount_code: new.discount_code,
            tax_amount: None,
            status: TransactionStatus::Pending,
            payment_method: None,
            failure_reason: None,
            failure_code: None,
            refund_reference: None,
            refund_reason: None,
            checkout_url: Some(new.checkout_url),
            receipt_url: None,
            webhook_payload: None,
            provider_metadata: new.provider_metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
            expires_at: Some(new.expires_at),
            refunded_at: None,
            last_verified_at: None,
        })
    }

    /// Amount charged as a money value
    pub fn money(&self) -> Result<Money> {
        Ok(Money::new(self.amount, self.currency)?)
    }

    pub fn display_amount(&self) -> String {
        self.currency.format_amount(self.amount)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// A session nobody has heard back about whose expiry has passed
    pub fn lapses_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::Pending && self.is_expired_at(now)
    }

    /// Completed but the subscription was never linked
    pub fn needs_activation(&self) -> bool {
        self.is_completed() && self.subscription_id.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Only completed payments that were not refunded yet
    pub fn can_be_refunded(&self) -> bool {
        self.is_completed() && self.refunded_at.is_none()
    }

    /// Latest moment anything touched the row
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_verified_at
            .map_or(self.updated_at, |verified| verified.max(self.updated_at))
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn mark_verifying(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Verifying;
        self.touch(now);
    }

    /// Return a claimed row to the state it had before the claim
    pub fn release_claim(&mut self, prior: TransactionStatus, now: DateTime<Utc>) {
        self.status = prior;
        self.last_verified_at = Some(now);
        self.touch(now);
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Processing;
        self.last_verified_at = Some(now);
        self.touch(now);
    }

    pub fn mark_completed(
        &mut self,
        completed_at: DateTime<Utc>,
        payment_method: Option<PaymentMethod>,
        now: DateTime<Utc>,
    ) {
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(completed_at);
        self.last_verified_at = Some(now);
        if payment_method.is_some() {
            self.payment_method = payment_method;
        }
        self.failure_reason = None;
        self.failure_code = None;
        self.touch(now);
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>, code: impl Into<String>, now: DateTime<Utc>) {
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.failure_code = Some(code.into());
        self.last_verified_at = Some(now);
        self.touch(now);
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Cancelled;
        self.last_verified_at = Some(now);
        self.touch(now);
    }

    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Expired;
        self.touch(now);
    }

    pub fn mark_refunded(
        &mut self,
        refund_reference: impl Into<String>,
        reason: impl Into<String>,
        refunded_at: DateTime<Utc>,
    ) {
        self.status = TransactionStatus::Refunded;
        self.refund_reference = Some(refund_reference.into());
        self.refund_reason = Some(reason.into());
        self.refunded_at = Some(refunded_at);
        self.touch(refunded_at);
    }

    /// Back to `Pending` with no expiry so verification can run again
    pub fn reset_to_pending(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Pending;
        self.expires_at = None;
        self.failure_reason = None;
        self.failure_code = None;
        self.touch(now);
    }

    pub fn link_subscription(&mut self, subscription_id: i64, now: DateTime<Utc>) {
        self.subscription_id = Some(subscription_id);
        self.touch(now);
    }
}
