use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::core::{AppError, Money, Result};
use crate::modules::providers::{with_provider_timeout, RefundParams, StrategyFactory};
use crate::modules::refunds::models::{
    CreateRefundRequest, RefundRequest, RefundResponse, RefundStatus, ReviewRefundRequest,
};
use crate::modules::refunds::repositories::RefundStore;
use crate::modules::transactions::models::TransactionStatus;
use crate::modules::transactions::repositories::TransactionStore;

const REASON_MIN_CHARS: usize = 10;
const REASON_MAX_CHARS: usize = 1000;
const PENDING_REVIEW_LIMIT: u32 = 500;

/// Refund workflow: customer request, admin review, provider execution
pub struct RefundService {
    refunds: Arc<dyn RefundStore>,
    transactions: Arc<dyn TransactionStore>,
    factory: Arc<StrategyFactory>,
    provider_timeout: Duration,
}

impl RefundService {
    pub fn new(
        refunds: Arc<dyn RefundStore>,
        transactions: Arc<dyn TransactionStore>,
        factory: Arc<StrategyFactory>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            refunds,
            transactions,
            factory,
            provider_timeout,
        }
    }

    /// Record a customer's refund request. No provider is contacted.
    pub async fn create_refund_request(
        &self,
        request: CreateRefundRequest,
    ) -> Result<RefundResponse> {
        let reason = request.reason.trim();
        let reason_chars = reason.chars().count();
        if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&reason_chars) {
            return Err(AppError::validation(format!(
                "Refund reason must be between {} and {} characters",
                REASON_MIN_CHARS, REASON_MAX_CHARS
            )));
        }

        let transaction = self
            .transactions
            .find_by_id(&request.payment_transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Payment transaction '{}'",
                    request.payment_transaction_id
                ))
            })?;

        if transaction.user_id != request.user_id {
            return Err(AppError::forbidden(
                "Payment does not belong to the requesting user",
            ));
        }
        if !transaction.can_be_refunded() {
            return Err(AppError::validation(format!(
                "Payment in status '{}' cannot be refunded",
                transaction.status
            )));
        }

        if request.amount <= Decimal::ZERO {
            return Err(AppError::validation("Refund amount must be positive"));
        }
        if request.amount.normalize().scale() > transaction.currency.scale() {
            return Err(AppError::validation(
                "Refund amount has too many decimal places",
            ));
        }
        if request.amount > transaction.amount {
            return Err(AppError::validation(format!(
                "Refund amount {} exceeds the payment amount {}",
                transaction.currency.format_amount(request.amount),
                transaction.display_amount()
            )));
        }

        let amount = Money::new(request.amount, transaction.currency)?;
        let refund = RefundRequest::new(&transaction.id, request.user_id, amount, reason);

        if !self
            .refunds
            .insert_within_limit(&refund, transaction.amount)
            .await?
        {
            return Err(AppError::validation(
                "Refund amount exceeds the remaining refundable balance",
            ));
        }

        info!(
            refund_id = %refund.id,
            transaction_id = %transaction.id,
            amount = %amount,
            "Refund requested"
        );

        Ok(refund.into())
    }

    /// Requested → UnderReview
    pub async fn start_review(&self, refund_id: &str, admin_id: i64) -> Result<RefundResponse> {
        let mut refund = self.load(refund_id).await?;
        refund.start_review(admin_id, Utc::now());

        if !self
            .refunds
            .transition(&refund, &[RefundStatus::Requested])
            .await?
        {
            return Err(AppError::conflict(
                "Refund is no longer awaiting review",
            ));
        }

        info!(refund_id = %refund.id, admin_id, "Refund review started");
        Ok(refund.into())
    }

    /// Approve or reject. Rejections must carry notes.
    pub async fn review_refund(
        &self,
        refund_id: &str,
        review: ReviewRefundRequest,
    ) -> Result<RefundResponse> {
        let notes = review
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let mut refund = self.load(refund_id).await?;
        if !RefundStatus::AWAITING_REVIEW.contains(&refund.status) {
            return Err(AppError::conflict(format!(
                "Refund in status '{}' cannot be reviewed",
                refund.status
            )));
        }

        let now = Utc::now();
        if review.approve {
            refund.approve(review.admin_id, notes, now);
        } else {
            let notes = notes.ok_or_else(|| {
                AppError::validation("Notes are required when rejecting a refund")
            })?;
            refund.reject(review.admin_id, notes, now);
        }

        if !self
            .refunds
            .transition(&refund, &RefundStatus::AWAITING_REVIEW)
            .await?
        {
            return Err(AppError::conflict("Refund was reviewed concurrently"));
        }

        info!(
            refund_id = %refund.id,
            admin_id = review.admin_id,
            status = %refund.status,
            "Refund reviewed"
        );
        Ok(refund.into())
    }

    /// Execute an approved refund with the provider.
    ///
    /// The payment moves to Refunded once its completed refunds add up to
    /// the amount charged. Until then it stays Completed so the remaining
    /// approved requests can still be paid out.
    pub async fn process_refund(&self, refund_id: &str) -> Result<RefundResponse> {
        let refund = self.load(refund_id).await?;
        if refund.status != RefundStatus::Approved {
            return Err(AppError::validation(format!(
                "Refund in status '{}' cannot be processed",
                refund.status
            )));
        }

        let transaction = self
            .transactions
            .find_by_id(&refund.payment_transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Payment transaction '{}'",
                    refund.payment_transaction_id
                ))
            })?;

        if !transaction.is_completed() {
            let mut failed = refund.clone();
            failed.mark_failed(
                format!("Payment is '{}' and can no longer be refunded", transaction.status),
                Utc::now(),
            );
            self.refunds
                .transition(&failed, &[RefundStatus::Approved])
                .await?;
            warn!(
                refund_id = %refund.id,
                transaction_id = %transaction.id,
                status = %transaction.status,
                "Refund failed, payment not in a refundable state"
            );
            return Ok(failed.into());
        }

        let strategy = self.factory.resolve(transaction.provider)?;
        let amount = refund.money()?;

        let mut claimed = refund.clone();
        claimed.mark_processing(Utc::now());
        if !self
            .refunds
            .transition(&claimed, &[RefundStatus::Approved])
            .await?
        {
            return Err(AppError::conflict("Refund is already being processed"));
        }

        info!(
            refund_id = %refund.id,
            provider = %transaction.provider,
            provider_reference = %transaction.provider_reference,
            amount = %amount,
            "Processing refund"
        );

        let outcome = with_provider_timeout(
            self.provider_timeout,
            transaction.provider,
            "refund",
            strategy.process_refund(RefundParams {
                provider_reference: transaction.provider_reference.clone(),
                amount,
                reason: refund.reason.clone(),
                idempotency_key: refund.id.clone(),
            }),
        )
        .await;

        let now = Utc::now();
        let mut settled = claimed.clone();

        match outcome {
            Ok(result) if result.success => {
                let processed_at = result.processed_at.unwrap_or(now);
                settled.mark_completed(result.refund_reference.clone(), processed_at);
                self.refunds
                    .transition(&settled, &[RefundStatus::Processing])
                    .await?;

                let refunded_total = self.refunded_total(&transaction.id).await?;
                if refunded_total < transaction.amount {
                    info!(
                        refund_id = %refund.id,
                        transaction_id = %transaction.id,
                        refunded = %refunded_total,
                        remaining = %(transaction.amount - refunded_total),
                        "Partial refund completed"
                    );
                    return Ok(settled.into());
                }

                let mut refunded = transaction.clone();
                refunded.mark_refunded(
                    result
                        .refund_reference
                        .unwrap_or_else(|| refund.id.clone()),
                    refund.reason.clone(),
                    processed_at,
                );
                if !self
                    .transactions
                    .transition(&refunded, &[TransactionStatus::Completed])
                    .await?
                {
                    warn!(
                        refund_id = %refund.id,
                        transaction_id = %transaction.id,
                        "Refund completed but the payment had already left Completed"
                    );
                }

                info!(refund_id = %refund.id, transaction_id = %transaction.id, "Payment fully refunded");
            }
            Ok(result) => {
                let message = result
                    .error_message
                    .unwrap_or_else(|| "Refund rejected by provider".to_string());
                warn!(refund_id = %refund.id, error = %message, "Provider rejected refund");
                settled.mark_failed(message, now);
                self.refunds
                    .transition(&settled, &[RefundStatus::Processing])
                    .await?;
            }
            Err(e) if e.is_retryable() => {
                warn!(refund_id = %refund.id, error = %e, "Refund call failed, returning to Approved");
                settled.release_claim(e.to_string(), now);
                if let Err(revert) = self
                    .refunds
                    .transition(&settled, &[RefundStatus::Processing])
                    .await
                {
                    error!(refund_id = %refund.id, error = %revert, "Failed to release refund claim");
                }
                return Err(e);
            }
            Err(e) => {
                error!(refund_id = %refund.id, error = %e, "Refund failed");
                settled.mark_failed(e.to_string(), now);
                self.refunds
                    .transition(&settled, &[RefundStatus::Processing])
                    .await?;
            }
        }

        Ok(settled.into())
    }

    pub async fn get_refund(&self, refund_id: &str) -> Result<RefundResponse> {
        Ok(self.load(refund_id).await?.into())
    }

    pub async fn list_user_refunds(&self, user_id: i64) -> Result<Vec<RefundResponse>> {
        Ok(self
            .refunds
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(RefundResponse::from)
            .collect())
    }

    /// Requested and UnderReview refunds, oldest first
    pub async fn list_pending_reviews(&self) -> Result<Vec<RefundResponse>> {
        Ok(self
            .refunds
            .find_by_status(&RefundStatus::AWAITING_REVIEW, PENDING_REVIEW_LIMIT)
            .await?
            .into_iter()
            .map(RefundResponse::from)
            .collect())
    }

    /// Sum of the completed refunds against a payment
    async fn refunded_total(&self, transaction_id: &str) -> Result<Decimal> {
        Ok(self
            .refunds
            .find_by_transaction(transaction_id)
            .await?
            .iter()
            .filter(|refund| refund.status == RefundStatus::Completed)
            .map(|refund| refund.refund_amount)
            .sum())
    }

    async fn load(&self, refund_id: &str) -> Result<RefundRequest> {
        self.refunds
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Refund request '{}'", refund_id)))
    }
}
