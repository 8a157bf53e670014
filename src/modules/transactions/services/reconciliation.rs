use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::payment_service::PaymentService;
use crate::core::Result;
use crate::modules::transactions::models::{TransactionStatus, VerifyPaymentRequest};

const DEFAULT_BATCH_SIZE: u32 = 200;

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub expired: usize,
    pub verified: usize,
    /// Completed payments whose subscription got linked on this pass
    pub activated: usize,
    pub failed: usize,
}

/// Background job that settles payments whose webhook never arrived
///
/// Lapsed Pending sessions are closed out and payments left open longer than
/// the webhook window are polled through the orchestrator. Completed payments
/// whose subscription activation failed are retried. Spawn [`start`] as a
/// tokio task from main.
///
/// [`start`]: ReconciliationSweep::start
pub struct ReconciliationSweep {
    payments: Arc<PaymentService>,
    interval: Duration,
    webhook_window: chrono::Duration,
    batch_size: u32,
}

impl ReconciliationSweep {
    pub fn new(
        payments: Arc<PaymentService>,
        interval: Duration,
        webhook_window: chrono::Duration,
    ) -> Self {
        Self {
            payments,
            interval,
            webhook_window,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.interval.as_secs(),
            webhook_window_mins = self.webhook_window.num_minutes(),
            "Starting payment reconciliation sweep"
        );

        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            match self.run_once().await {
                Ok(report) => {
                    if report != ReconciliationReport::default() {
                        info!(
                            expired = report.expired,
                            verified = report.verified,
                            activated = report.activated,
                            failed = report.failed,
                            "Reconciliation sweep finished"
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation sweep failed");
                }
            }
        }
    }

    /// One pass over the open transactions
    pub async fn run_once(&self) -> Result<ReconciliationReport> {
        let now = Utc::now();
        let open = self.payments.store().find_open(self.batch_size).await?;
        let mut report = ReconciliationReport::default();

        for transaction in open {
            let expired = transaction.lapses_at(now);
            let stale = now - transaction.last_activity() > self.webhook_window;
            if !expired && !stale {
                continue;
            }

            debug!(
                transaction_id = %transaction.id,
                provider = %transaction.provider,
                expired,
                "Reconciling open payment"
            );

            match self
                .payments
                .verify_payment(VerifyPaymentRequest::poll(&transaction.provider_reference))
                .await
            {
                Ok(response) if response.status == TransactionStatus::Expired => {
                    report.expired += 1
                }
                Ok(_) => report.verified += 1,
                Err(e) => {
                    warn!(
                        transaction_id = %transaction.id,
                        provider_reference = %transaction.provider_reference,
                        error = %e,
                        "Failed to reconcile payment"
                    );
                    report.failed += 1;
                }
            }
        }

        for transaction in self
            .payments
            .store()
            .find_unlinked_completed(self.batch_size)
            .await?
        {
            match self
                .payments
                .verify_payment(VerifyPaymentRequest::poll(&transaction.provider_reference))
                .await
            {
                Ok(response) if response.subscription_id.is_some() => report.activated += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        transaction_id = %transaction.id,
                        error = %e,
                        "Subscription activation still failing"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
