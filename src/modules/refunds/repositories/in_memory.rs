use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::refund_repository::RefundStore;
use crate::core::{AppError, Result};
use crate::modules::refunds::models::{RefundRequest, RefundStatus};

/// Refund store kept in process memory
#[derive(Default)]
pub struct InMemoryRefundStore {
    rows: RwLock<HashMap<String, RefundRequest>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn insert_within_limit(&self, refund: &RefundRequest, limit: Decimal) -> Result<bool> {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&refund.id) {
            return Err(AppError::conflict(format!(
                "Refund request '{}' already exists",
                refund.id
            )));
        }

        let already_counted: Decimal = rows
            .values()
            .filter(|row| row.payment_transaction_id == refund.payment_transaction_id)
            .filter(|row| RefundStatus::COUNTED.contains(&row.status))
            .map(|row| row.refund_amount)
            .sum();

        if already_counted + refund.refund_amount > limit {
            return Ok(false);
        }

        rows.insert(refund.id.clone(), refund.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RefundRequest>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RefundRequest>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(matching)
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<RefundRequest>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .values()
            .filter(|row| row.payment_transaction_id == transaction_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(matching)
    }

    async fn find_by_status(
        &self,
        statuses: &[RefundStatus],
        limit: u32,
    ) -> Result<Vec<RefundRequest>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .values()
            .filter(|row| statuses.contains(&row.status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn transition(&self, refund: &RefundRequest, expected: &[RefundStatus]) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let Some(current) = rows.get_mut(&refund.id) else {
            return Ok(false);
        };

        if !expected.contains(&current.status) {
            return Ok(false);
        }

        let mut updated = refund.clone();
        updated.payment_transaction_id = current.payment_transaction_id.clone();
        updated.user_id = current.user_id;
        updated.refund_amount = current.refund_amount;
        updated.currency = current.currency;
        updated.requested_at = current.requested_at;
        *current = updated;

        Ok(true)
    }
}
