use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::refund_request::{RefundRequest, RefundStatus};
use crate::core::Currency;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRefundRequest {
    pub payment_transaction_id: String,
    pub user_id: i64,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartReviewRequest {
    pub admin_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRefundRequest {
    pub admin_id: i64,
    pub approve: bool,
    /// Required when rejecting
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    pub id: String,
    pub payment_transaction_id: String,
    pub user_id: i64,
    pub refund_amount: Decimal,
    pub currency: Currency,
    pub display_amount: String,
    pub reason: String,
    pub status: RefundStatus,
    pub reviewed_by_admin_id: Option<i64>,
    pub admin_notes: Option<String>,
    pub provider_refund_reference: Option<String>,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<RefundRequest> for RefundResponse {
    fn from(refund: RefundRequest) -> Self {
        let display_amount = refund.currency.format_amount(refund.refund_amount);
        Self {
            id: refund.id,
            payment_transaction_id: refund.payment_transaction_id,
            user_id: refund.user_id,
            refund_amount: refund.refund_amount,
            currency: refund.currency,
            display_amount,
            reason: refund.reason,
            status: refund.status,
            reviewed_by_admin_id: refund.reviewed_by_admin_id,
            admin_notes: refund.admin_notes,
            provider_refund_reference: refund.provider_refund_reference,
            error_message: refund.error_message,
            requested_at: refund.requested_at,
            reviewed_at: refund.reviewed_at,
            processed_at: refund.processed_at,
        }
    }
}
