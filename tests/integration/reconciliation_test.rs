#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use rust_decimal_macros::dec;

use careera_billing::core::Currency;
use careera_billing::pricing::ProductType;
use careera_billing::providers::{PaymentProvider, ProviderStatus};
use careera_billing::transactions::models::VerifyPaymentRequest;
use careera_billing::transactions::{ReconciliationReport, ReconciliationSweep, TransactionStatus};
use helpers::*;

fn sweep(ctx: &TestContext, webhook_window: ChronoDuration) -> ReconciliationSweep {
    ReconciliationSweep::new(ctx.payments.clone(), Duration::from_secs(60), webhook_window)
}

/// Every open row counts as stale
fn eager_sweep(ctx: &TestContext) -> ReconciliationSweep {
    sweep(ctx, ChronoDuration::seconds(-1))
}

#[tokio::test]
async fn test_expired_session_closed_without_polling() {
    let ctx = TestContext::new();
    ctx.card.set_session_ttl(ChronoDuration::minutes(-1));
    let session = ctx
        .open_session(ProductType::SingleInterview, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let report = sweep(&ctx, ChronoDuration::minutes(30)).run_once().await.unwrap();

    assert_eq!(
        report,
        ReconciliationReport {
            expired: 1,
            verified: 0,
            activated: 0,
            failed: 0
        }
    );
    assert_eq!(ctx.card.status_calls(), 0);
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Expired).await;
}

#[tokio::test]
async fn test_stale_payment_polled_and_completed() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::CvBuilderSubscription, PaymentProvider::WalletProvider, Currency::USD)
        .await;
    ctx.wallet
        .set_status(ProviderStatus::Completed, Some(dec!(6.99)), Some(Currency::USD));

    let report = eager_sweep(&ctx).run_once().await.unwrap();

    assert_eq!(report.verified, 1);
    assert_eq!(ctx.wallet.status_calls(), 1);
    assert_eq!(ctx.identity.activation_count(), 1);
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Completed).await;
}

#[tokio::test]
async fn test_recent_payments_left_for_webhooks() {
    let ctx = TestContext::new();
    ctx.open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let report = sweep(&ctx, ChronoDuration::minutes(30)).run_once().await.unwrap();

    assert_eq!(report, ReconciliationReport::default());
    assert_eq!(ctx.card.status_calls(), 0);
}

#[tokio::test]
async fn test_provider_errors_do_not_abort_sweep() {
    let ctx = TestContext::new();
    let broken = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;
    let healthy = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::RegionalGateway, Currency::EGP)
        .await;
    ctx.card
        .fail_status_checks("Stripe API error - HTTP 503 (unavailable)");
    ctx.regional
        .set_status(ProviderStatus::Failed, None, None);

    let report = eager_sweep(&ctx).run_once().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.verified, 1);
    assert_stored_status(&ctx, &broken.provider_reference, TransactionStatus::Pending).await;
    assert_stored_status(&ctx, &healthy.provider_reference, TransactionStatus::Failed).await;
}

#[tokio::test]
async fn test_settled_payments_not_revisited() {
    let ctx = TestContext::new();
    ctx.open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;
    ctx.card
        .set_status(ProviderStatus::Cancelled, None, None);

    let sweep = Arc::new(eager_sweep(&ctx).with_batch_size(10));
    let first = sweep.run_once().await.unwrap();
    let second = sweep.run_once().await.unwrap();

    assert_eq!(first.verified, 1);
    assert_eq!(second, ReconciliationReport::default());
    assert_eq!(ctx.card.status_calls(), 1);
}

#[tokio::test]
async fn test_lapsed_processing_payment_left_open() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;
    ctx.card.set_status(ProviderStatus::Processing, None, None);
    ctx.payments
        .verify_payment(VerifyPaymentRequest::poll(&session.provider_reference))
        .await
        .unwrap();
    ctx.lapse_session(&session.provider_reference).await;

    let report = sweep(&ctx, ChronoDuration::minutes(30)).run_once().await.unwrap();

    assert_eq!(report, ReconciliationReport::default());
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Processing).await;
}

#[tokio::test]
async fn test_sweep_retries_failed_activation() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::BundleSubscription, PaymentProvider::CardGateway, Currency::USD)
        .await;
    ctx.card
        .set_status(ProviderStatus::Completed, Some(dec!(13.99)), Some(Currency::USD));
    ctx.identity.fail_activations(true);
    assert!(ctx
        .payments
        .verify_payment(VerifyPaymentRequest::poll(&session.provider_reference))
        .await
        .is_err());

    let sweep = sweep(&ctx, ChronoDuration::minutes(30));
    let still_down = sweep.run_once().await.unwrap();
    assert_eq!(still_down.failed, 1);
    assert_eq!(still_down.activated, 0);

    ctx.identity.fail_activations(false);
    let recovered = sweep.run_once().await.unwrap();

    assert_eq!(
        recovered,
        ReconciliationReport {
            activated: 1,
            ..ReconciliationReport::default()
        }
    );
    assert_eq!(ctx.identity.activation_count(), 1);
    assert_eq!(ctx.card.status_calls(), 1);
    assert_eq!(sweep.run_once().await.unwrap(), ReconciliationReport::default());
}
