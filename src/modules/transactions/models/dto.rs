use super::payment_transaction::{PaymentTransaction, TransactionStatus};
use crate::core::Currency;
use crate::modules::pricing::{BillingCycle, ProductType};
use crate::modules::providers::{PaymentMethod, PaymentProvider};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Checkout request from the UI
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: i64,
    pub product_type: ProductType,
    pub provider: PaymentProvider,
    pub currency: Currency,
    /// Defaults to the product's first cycle
    pub billing_cycle: Option<BillingCycle>,
    pub discount_code: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionResponse {
    pub transaction_id: String,
    pub provider_reference: String,
    pub checkout_url: String,
    pub amount: Decimal,
    pub original_amount: Option<Decimal>,
    pub discount_code: Option<String>,
    pub currency: Currency,
    pub display_amount: String,
    pub product_type: ProductType,
    pub billing_cycle: Option<BillingCycle>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&PaymentTransaction> for PaymentSessionResponse {
    fn from(tx: &PaymentTransaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            provider_reference: tx.provider_reference.clone(),
            checkout_url: tx.checkout_url.clone().unwrap_or_default(),
            amount: tx.amount,
            original_amount: tx.original_amount,
            discount_code: tx.discount_code.clone(),
            currency: tx.currency,
            display_amount: tx.display_amount(),
            product_type: tx.product_type,
            billing_cycle: tx.billing_cycle,
            expires_at: tx.expires_at,
        }
    }
}

/// Verification by client poll, or with a signed webhook body attached
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyPaymentRequest {
    pub provider_reference: String,
    pub signature: Option<String>,
    pub webhook_payload: Option<String>,
}

impl VerifyPaymentRequest {
    pub fn poll(provider_reference: impl Into<String>) -> Self {
        Self {
            provider_reference: provider_reference.into(),
            signature: None,
            webhook_payload: None,
        }
    }

    pub fn signed(
        provider_reference: impl Into<String>,
        signature: impl Into<String>,
        webhook_payload: impl Into<String>,
    ) -> Self {
        Self {
            provider_reference: provider_reference.into(),
            signature: Some(signature.into()),
            webhook_payload: Some(webhook_payload.into()),
        }
    }

    /// Signature and body, when both are present and non-empty
    pub fn webhook(&self) -> Option<(&str, &str)> {
        match (self.signature.as_deref(), self.webhook_payload.as_deref()) {
            (Some(signature), Some(payload))
                if !signature.trim().is_empty() && !payload.trim().is_empty() =>
            {
                Some((signature, payload))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerificationResponse {
    pub transaction_id: String,
    pub user_id: i64,
    pub status: TransactionStatus,
    pub subscription_id: Option<i64>,
    pub message: String,
    pub completed_at: Option<DateTime<Utc>>,
    /// Fresh access token, minted by the call that activated the subscription
    pub token: Option<String>,
}

impl PaymentVerificationResponse {
    pub fn from_transaction(tx: &PaymentTransaction, token: Option<String>) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            user_id: tx.user_id,
            status: tx.status,
            subscription_id: tx.subscription_id,
            message: verification_message(tx.status).to_string(),
            completed_at: tx.completed_at,
            token,
        }
    }
}

pub fn verification_message(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Completed => "Payment completed successfully",
        TransactionStatus::Failed => "Payment failed",
        TransactionStatus::Pending => "Payment is still pending",
        TransactionStatus::Processing => "Payment is being processed",
        TransactionStatus::Verifying => "Payment verification in progress",
        TransactionStatus::Cancelled => "Payment was cancelled",
        TransactionStatus::Expired => "Payment session expired",
        TransactionStatus::Refunded => "Payment was refunded",
    }
}

/// Full view of a single transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub user_id: i64,
    pub subscription_id: Option<i64>,
    pub provider: PaymentProvider,
    pub provider_reference: String,
    pub product_type: ProductType,
    pub billing_cycle: Option<BillingCycle>,
    pub amount: Decimal,
    pub original_amount: Option<Decimal>,
    pub discount_code: Option<String>,
    pub currency: Currency,
    pub display_amount: String,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub failure_reason: Option<String>,
    pub refund_reason: Option<String>,
    pub checkout_url: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(tx: PaymentTransaction) -> Self {
        let display_amount = tx.display_amount();
        Self {
            id: tx.id,
            user_id: tx.user_id,
            subscription_id: tx.subscription_id,
            provider: tx.provider,
            provider_reference: tx.provider_reference,
            product_type: tx.product_type,
            billing_cycle: tx.billing_cycle,
            amount: tx.amount,
            original_amount: tx.original_amount,
            discount_code: tx.discount_code,
            currency: tx.currency,
            display_amount,
            status: tx.status,
            payment_method: tx.payment_method,
            failure_reason: tx.failure_reason,
            refund_reason: tx.refund_reason,
            checkout_url: tx.checkout_url,
            receipt_url: tx.receipt_url,
            created_at: tx.created_at,
            completed_at: tx.completed_at,
            expires_at: tx.expires_at,
            refunded_at: tx.refunded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHistoryItem {
    pub id: String,
    pub product_type: ProductType,
    pub amount: Decimal,
    pub currency: Currency,
    pub display_amount: String,
    pub status: TransactionStatus,
    pub provider: PaymentProvider,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub receipt_url: Option<String>,
}

impl From<PaymentTransaction> for PaymentHistoryItem {
    fn from(tx: PaymentTransaction) -> Self {
        let display_amount = tx.display_amount();
        Self {
            id: tx.id,
            product_type: tx.product_type,
            amount: tx.amount,
            currency: tx.currency,
            display_amount,
            status: tx.status,
            provider: tx.provider,
            payment_method: tx.payment_method,
            created_at: tx.created_at,
            completed_at: tx.completed_at,
            receipt_url: tx.receipt_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total_items: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(page_size)) as u32
        };

        Self {
            items,
            total_items,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub transactions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatistics {
    pub currency: Currency,
    pub total_transactions: u64,
    pub total_revenue: Decimal,
    pub completed_count: u64,
    pub pending_count: u64,
    pub failed_count: u64,
    pub refunded_count: u64,
    pub average_transaction_value: Decimal,
    pub transactions_by_provider: BTreeMap<String, u64>,
    pub transactions_by_product: BTreeMap<String, u64>,
    pub daily_revenue: Vec<DailyRevenue>,
}

impl PaymentStatistics {
    /// Aggregate over every transaction in one currency
    pub fn from_transactions(currency: Currency, transactions: &[PaymentTransaction]) -> Self {
        let mut stats = PaymentStatistics {
            currency,
            total_transactions: transactions.len() as u64,
            total_revenue: Decimal::ZERO,
            completed_count: 0,
            pending_count: 0,
            failed_count: 0,
            refunded_count: 0,
            average_transaction_value: Decimal::ZERO,
            transactions_by_provider: BTreeMap::new(),
            transactions_by_product: BTreeMap::new(),
            daily_revenue: Vec::new(),
        };
        let mut daily: BTreeMap<NaiveDate, (Decimal, u64)> = BTreeMap::new();

        for tx in transactions {
            match tx.status {
                TransactionStatus::Completed => {
                    stats.completed_count += 1;
                    stats.total_revenue += tx.amount;
                    let day = tx.completed_at.unwrap_or(tx.created_at).date_naive();
                    let entry = daily.entry(day).or_insert((Decimal::ZERO, 0));
                    entry.0 += tx.amount;
                    entry.1 += 1;
                }
                TransactionStatus::Pending
                | TransactionStatus::Processing
                | TransactionStatus::Verifying => stats.pending_count += 1,
                TransactionStatus::Failed => stats.failed_count += 1,
                TransactionStatus::Refunded => stats.refunded_count += 1,
                TransactionStatus::Cancelled | TransactionStatus::Expired => {}
            }

            *stats
                .transactions_by_provider
                .entry(tx.provider.to_string())
                .or_insert(0) += 1;
            *stats
                .transactions_by_product
                .entry(tx.product_type.to_string())
                .or_insert(0) += 1;
        }

        if stats.completed_count > 0 {
            stats.average_transaction_value = currency
                .round(stats.total_revenue / Decimal::from(stats.completed_count));
        }

        stats.daily_revenue = daily
            .into_iter()
            .map(|(date, (revenue, transactions))| DailyRevenue {
                date,
                revenue,
                transactions,
            })
            .collect();

        stats
    }
}
