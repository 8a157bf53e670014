use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::refunds::models::{RefundRequest, RefundStatus};

/// Persistence port for refund requests. Rows are never deleted.
#[async_trait]
pub trait RefundStore: Send + Sync {
    /// Insert `refund` if the amounts already counted against its
    /// transaction plus this one stay within `limit`. The check and the
    /// insert are atomic per transaction. Returns false when over the limit.
    async fn insert_within_limit(&self, refund: &RefundRequest, limit: Decimal) -> Result<bool>;

    async fn find_by_id(&self, id: &str) -> Result<Option<RefundRequest>>;

    /// Newest first
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RefundRequest>>;

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<RefundRequest>>;

    /// Oldest first
    async fn find_by_status(
        &self,
        statuses: &[RefundStatus],
        limit: u32,
    ) -> Result<Vec<RefundRequest>>;

    /// Compare-and-set on the stored status
    async fn transition(&self, refund: &RefundRequest, expected: &[RefundStatus]) -> Result<bool>;
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, payment_transaction_id, user_id, refund_amount, currency, reason,
        status, reviewed_by_admin_id, admin_notes, provider_refund_reference,
        error_message, requested_at, reviewed_at, processed_at, updated_at
    FROM refund_requests
"#;

pub struct MySqlRefundRepository {
    pool: MySqlPool,
}

impl MySqlRefundRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundStore for MySqlRefundRepository {
    async fn insert_within_limit(&self, refund: &RefundRequest, limit: Decimal) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent requests against the same payment
        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM payment_transactions WHERE id = ? FOR UPDATE")
                .bind(&refund.payment_transaction_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::not_found(format!(
                "Payment transaction '{}'",
                refund.payment_transaction_id
            )));
        }

        let mut sum = QueryBuilder::<MySql>::new(
            "SELECT CAST(COALESCE(SUM(refund_amount), 0) AS DECIMAL(12, 2)) FROM refund_requests WHERE payment_transaction_id = ",
        );
        sum.push_bind(&refund.payment_transaction_id);
        sum.push(" AND status IN (");
        let mut statuses = sum.separated(", ");
        for status in RefundStatus::COUNTED {
            statuses.push_bind(status);
        }
        statuses.push_unseparated(")");

        let already_counted: Decimal = sum.build_query_scalar().fetch_one(&mut *tx).await?;

        if already_counted + refund.refund_amount > limit {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO refund_requests (
                id, payment_transaction_id, user_id, refund_amount, currency, reason,
                status, reviewed_by_admin_id, admin_notes, provider_refund_reference,
                error_message, requested_at, reviewed_at, processed_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.payment_transaction_id)
        .bind(refund.user_id)
        .bind(refund.refund_amount)
        .bind(refund.currency)
        .bind(&refund.reason)
        .bind(refund.status)
        .bind(refund.reviewed_by_admin_id)
        .bind(&refund.admin_notes)
        .bind(&refund.provider_refund_reference)
        .bind(&refund.error_message)
        .bind(refund.requested_at)
        .bind(refund.reviewed_at)
        .bind(refund.processed_at)
        .bind(refund.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RefundRequest>> {
        let refund =
            sqlx::query_as::<_, RefundRequest>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(refund)
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RefundRequest>> {
        let refunds = sqlx::query_as::<_, RefundRequest>(&format!(
            "{} WHERE user_id = ? ORDER BY requested_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<RefundRequest>> {
        let refunds = sqlx::query_as::<_, RefundRequest>(&format!(
            "{} WHERE payment_transaction_id = ? ORDER BY requested_at ASC",
            SELECT_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    async fn find_by_status(
        &self,
        statuses: &[RefundStatus],
        limit: u32,
    ) -> Result<Vec<RefundRequest>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<MySql>::new(SELECT_COLUMNS);
        query.push(" WHERE status IN (");
        let mut separated = query.separated(", ");
        for status in statuses {
            separated.push_bind(*status);
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY requested_at ASC LIMIT ");
        query.push_bind(limit);

        let refunds = query
            .build_query_as::<RefundRequest>()
            .fetch_all(&self.pool)
            .await?;

        Ok(refunds)
    }

    async fn transition(&self, refund: &RefundRequest, expected: &[RefundStatus]) -> Result<bool> {
        if expected.is_empty() {
            return Ok(false);
        }

        let mut query = QueryBuilder::<MySql>::new("UPDATE refund_requests SET status = ");
        query.push_bind(refund.status);
        query
            .push(", reviewed_by_admin_id = ")
            .push_bind(refund.reviewed_by_admin_id);
        query.push(", admin_notes = ").push_bind(&refund.admin_notes);
        query
            .push(", provider_refund_reference = ")
            .push_bind(&refund.provider_refund_reference);
        query.push(", error_message = ").push_bind(&refund.error_message);
        query.push(", reviewed_at = ").push_bind(refund.reviewed_at);
        query.push(", processed_at = ").push_bind(refund.processed_at);
        query.push(", updated_at = ").push_bind(refund.updated_at);
        query.push(" WHERE id = ").push_bind(&refund.id);
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
