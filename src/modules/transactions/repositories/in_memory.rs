use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::transaction_repository::TransactionStore;
use crate::core::{AppError, Currency, Result};
use crate::modules::transactions::models::{PaymentTransaction, TransactionStatus};

/// Transaction store kept in process memory.
///
/// Compare-and-set happens under the write lock. Used by tests and local
/// runs without a database.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: RwLock<HashMap<String, PaymentTransaction>>,
}

impl InMemoryTransactionStore {
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
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<()> {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&transaction.id)
            || rows
                .values()
                .any(|row| row.provider_reference == transaction.provider_reference)
        {
            return Err(AppError::conflict(format!(
                "Transaction with provider reference '{}' already exists",
                transaction.provider_reference
            )));
        }

        rows.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_by_reference(
        &self,
        provider_reference: &str,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|row| row.provider_reference == provider_reference)
            .cloned())
    }

    async fn find_by_user(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PaymentTransaction>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_by_user(&self, user_id: i64) -> Result<u64> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.user_id == user_id)
            .count() as u64)
    }

    async fn find_by_currency(&self, currency: Currency) -> Result<Vec<PaymentTransaction>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .values()
            .filter(|row| row.currency == currency)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn find_open(&self, limit: u32) -> Result<Vec<PaymentTransaction>> {
        let rows = self.rows.read().await;
        let mut open: Vec<_> = rows
            .values()
            .filter(|row| TransactionStatus::OPEN.contains(&row.status))
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        open.truncate(limit as usize);
        Ok(open)
    }

    async fn find_unlinked_completed(&self, limit: u32) -> Result<Vec<PaymentTransaction>> {
        let rows = self.rows.read().await;
        let mut unlinked: Vec<_> = rows
            .values()
            .filter(|row| row.is_completed() && row.subscription_id.is_none())
            .cloned()
            .collect();
        unlinked.sort_by_key(|row| row.completed_at);
        unlinked.truncate(limit as usize);
        Ok(unlinked)
    }

    async fn transition(
        &self,
        transaction: &PaymentTransaction,
        expected: &[TransactionStatus],
    ) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let Some(current) = rows.get_mut(&transaction.id) else {
            return Ok(false);
        };

        if !expected.contains(&current.status) {
            return Ok(false);
        }

        // identity columns stay as inserted
        let mut updated = transaction.clone();
        updated.provider_reference = current.provider_reference.clone();
        updated.user_id = current.user_id;
        updated.amount = current.amount;
        updated.currency = current.currency;
        updated.created_at = current.created_at;
        *current = updated;

        Ok(true)
    }
}
