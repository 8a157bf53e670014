use super::super::models::{PaymentTransaction, TransactionStatus};
use crate::core::{AppError, Currency, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, QueryBuilder};

/// Persistence port for payment transactions.
///
/// Rows are never deleted. Every state change goes through [`transition`],
/// a compare-and-set on the current status, so concurrent verifications of
/// the same payment cannot both win.
///
/// [`transition`]: TransactionStore::transition
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new row. A duplicate `provider_reference` is a `Conflict`.
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentTransaction>>;

    async fn find_by_reference(&self, provider_reference: &str)
        -> Result<Option<PaymentTransaction>>;

    /// Newest first
    async fn find_by_user(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PaymentTransaction>>;

    async fn count_by_user(&self, user_id: i64) -> Result<u64>;

    async fn find_by_currency(&self, currency: Currency) -> Result<Vec<PaymentTransaction>>;

    /// Pending, Processing and Verifying rows, oldest first
    async fn find_open(&self, limit: u32) -> Result<Vec<PaymentTransaction>>;

    /// Completed rows with no linked subscription, oldest completion first
    async fn find_unlinked_completed(&self, limit: u32) -> Result<Vec<PaymentTransaction>>;

    /// Write the mutable columns of `transaction` if the stored status is one
    /// of `expected`. Returns whether the row was updated.
    async fn transition(
        &self,
        transaction: &PaymentTransaction,
        expected: &[TransactionStatus],
    ) -> Result<bool>;
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, user_id, subscription_id, provider, provider_reference,
        product_type, billing_cycle, amount, currency, original_amount,
        discount_code, tax_amount, status, payment_method, failure_reason,
        failure_code, refund_reference, refund_reason, checkout_url,
        receipt_url, webhook_payload, provider_metadata, created_at,
        updated_at, completed_at, expires_at, refunded_at, last_verified_at
    FROM payment_transactions
"#;

/// MySQL-backed transaction store
pub struct MySqlTransactionRepository {
    pool: MySqlPool,
}

impl MySqlTransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionStore for MySqlTransactionRepository {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (
                id, user_id, subscription_id, provider, provider_reference,
                product_type, billing_cycle, amount, currency, original_amount,
                discount_code, tax_amount, status, payment_method, failure_reason,
                failure_code, refund_reference, refund_reason, checkout_url,
                receipt_url, webhook_payload, provider_metadata, created_at,
                updated_at, completed_at, expires_at, refunded_at, last_verified_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.user_id)
        .bind(transaction.subscription_id)
        .bind(transaction.provider)
        .bind(&transaction.provider_reference)
        .bind(transaction.product_type)
        .bind(transaction.billing_cycle)
        .bind(transaction.amount)
        .bind(transaction.currency)
        .bind(transaction.original_amount)
        .bind(&transaction.discount_code)
        .bind(transaction.tax_amount)
        .bind(transaction.status)
        .bind(transaction.payment_method)
        .bind(&transaction.failure_reason)
        .bind(&transaction.failure_code)
        .bind(&transaction.refund_reference)
        .bind(&transaction.refund_reason)
        .bind(&transaction.checkout_url)
        .bind(&transaction.receipt_url)
        .bind(&transaction.webhook_payload)
        .bind(Json(&transaction.provider_metadata))
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .bind(transaction.completed_at)
        .bind(transaction.expires_at)
        .bind(transaction.refunded_at)
        .bind(transaction.last_verified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::conflict(
                format!(
                    "Transaction with provider reference '{}' already exists",
                    transaction.provider_reference
                ),
            ),
            other => AppError::Database(other),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentTransaction>> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "{} WHERE id = ?",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn find_by_reference(
        &self,
        provider_reference: &str,
    ) -> Result<Option<PaymentTransaction>> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "{} WHERE provider_reference = ?",
            SELECT_COLUMNS
        ))
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn find_by_user(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PaymentTransaction>> {
        let transactions = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn count_by_user(&self, user_id: i64) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_transactions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn find_by_currency(&self, currency: Currency) -> Result<Vec<PaymentTransaction>> {
        let transactions = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "{} WHERE currency = ? ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn find_open(&self, limit: u32) -> Result<Vec<PaymentTransaction>> {
        let mut query = QueryBuilder::<MySql>::new(SELECT_COLUMNS);
        query.push(" WHERE status IN (");
        let mut statuses = query.separated(", ");
        for status in TransactionStatus::OPEN {
            statuses.push_bind(status);
        }
        statuses.push_unseparated(")");
        query.push(" ORDER BY created_at ASC LIMIT ");
        query.push_bind(limit);

        let transactions = query
            .build_query_as::<PaymentTransaction>()
            .fetch_all(&self.pool)
            .await?;

        Ok(transactions)
    }

    async fn find_unlinked_completed(&self, limit: u32) -> Result<Vec<PaymentTransaction>> {
        let transactions = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "{} WHERE status = ? AND subscription_id IS NULL ORDER BY completed_at ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(TransactionStatus::Completed)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn transition(
        &self,
        transaction: &PaymentTransaction,
        expected: &[TransactionStatus],
    ) -> Result<bool> {
        if expected.is_empty() {
            return Ok(false);
        }

        let mut query = QueryBuilder::<MySql>::new("UPDATE payment_transactions SET status = ");
        query.push_bind(transaction.status);
        query.push(", subscription_id = ").push_bind(transaction.subscription_id);
        query.push(", payment_method = ").push_bind(transaction.payment_method);
        query.push(", failure_reason = ").push_bind(&transaction.failure_reason);
        query.push(", failure_code = ").push_bind(&transaction.failure_code);
        query.push(", refund_reference = ").push_bind(&transaction.refund_reference);
        query.push(", refund_reason = ").push_bind(&transaction.refund_reason);
        query.push(", receipt_url = ").push_bind(&transaction.receipt_url);
        query.push(", webhook_payload = ").push_bind(&transaction.webhook_payload);
        query
            .push(", provider_metadata = ")
            .push_bind(Json(&transaction.provider_metadata));
        query.push(", updated_at = ").push_bind(transaction.updated_at);
        query.push(", completed_at = ").push_bind(transaction.completed_at);
        query.push(", expires_at = ").push_bind(transaction.expires_at);
        query.push(", refunded_at = ").push_bind(transaction.refunded_at);
        query.push(", last_verified_at = ").push_bind(transaction.last_verified_at);
        query.push(" WHERE id = ").push_bind(&transaction.id);
        query.push(" AND status IN (");
        let mut statuses = query.separated(", ");
        for status in expected {
            statuses.push_bind(*status);
        }
        statuses.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;

        Ok(result.rows_affected() == 1)
    }
}
