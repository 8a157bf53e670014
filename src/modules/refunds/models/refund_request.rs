use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::core::{Currency, Money};

/// Refund lifecycle
///
/// Requested → UnderReview → Approved | Rejected, then
/// Approved → Processing → Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Requested,
    UnderReview,
    Approved,
    Rejected,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    /// Statuses whose amounts count against the refundable balance
    pub const COUNTED: [RefundStatus; 5] = [
        RefundStatus::Requested,
        RefundStatus::UnderReview,
        RefundStatus::Approved,
        RefundStatus::Processing,
        RefundStatus::Completed,
    ];

    /// Waiting on an admin decision
    pub const AWAITING_REVIEW: [RefundStatus; 2] =
        [RefundStatus::Requested, RefundStatus::UnderReview];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Completed | RefundStatus::Failed | RefundStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Requested => "requested",
            RefundStatus::UnderReview => "under_review",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RefundRequest {
    pub id: String,
    pub payment_transaction_id: String,
    pub user_id: i64,
    pub refund_amount: Decimal,
    pub currency: Currency,
    pub reason: String,
    pub status: RefundStatus,
    pub reviewed_by_admin_id: Option<i64>,
    pub admin_notes: Option<String>,
    pub provider_refund_reference: Option<String>,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RefundRequest {
    pub fn new(
        payment_transaction_id: impl Into<String>,
        user_id: i64,
        amount: Money,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            payment_transaction_id: payment_transaction_id.into(),
            user_id,
            refund_amount: amount.amount(),
            currency: amount.currency(),
            reason: reason.into(),
            status: RefundStatus::Requested,
            reviewed_by_admin_id: None,
            admin_notes: None,
            provider_refund_reference: None,
            error_message: None,
            requested_at: now,
            reviewed_at: None,
            processed_at: None,
            updated_at: now,
        }
    }

    pub fn money(&self) -> crate::core::Result<Money> {
        Ok(Money::new(self.refund_amount, self.currency)?)
    }

    pub fn start_review(&mut self, admin_id: i64, now: DateTime<Utc>) {
        self.status = RefundStatus::UnderReview;
        self.reviewed_by_admin_id = Some(admin_id);
        self.updated_at = now;
    }

    pub fn approve(&mut self, admin_id: i64, notes: Option<String>, now: DateTime<Utc>) {
        self.status = RefundStatus::Approved;
        self.reviewed_by_admin_id = Some(admin_id);
        self.admin_notes = notes;
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }

    pub fn reject(&mut self, admin_id: i64, notes: impl Into<String>, now: DateTime<Utc>) {
        self.status = RefundStatus::Rejected;
        self.reviewed_by_admin_id = Some(admin_id);
        self.admin_notes = Some(notes.into());
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = RefundStatus::Processing;
        self.updated_at = now;
    }

    /// Back to Approved after a transient provider failure
    pub fn release_claim(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = RefundStatus::Approved;
        self.error_message = Some(error.into());
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, provider_reference: Option<String>, now: DateTime<Utc>) {
        self.status = RefundStatus::Completed;
        self.provider_refund_reference = provider_reference;
        self.error_message = None;
        self.processed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = RefundStatus::Failed;
        self.error_message = Some(error.into());
        self.processed_at = Some(now);
        self.updated_at = now;
    }
}
