#[path = "../helpers/mod.rs"]
mod helpers;

use rust_decimal_macros::dec;

use careera_billing::core::{AppError, Currency};
use careera_billing::pricing::ProductType;
use careera_billing::providers::{PaymentProvider, ProviderStatus};
use careera_billing::transactions::{TransactionStatus, WebhookOutcome};
use helpers::*;

fn completed_body(reference: &str, amount: rust_decimal::Decimal, currency: Currency) -> String {
    webhook_body(reference, ProviderStatus::Completed, Some(amount), Some(currency))
}

#[tokio::test]
async fn test_signed_webhook_completes_payment() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::RegionalGateway, Currency::EGP)
        .await;

    let payload = completed_body(&session.provider_reference, dec!(89.99), Currency::EGP);
    let outcome = ctx
        .webhooks
        .handle(
            PaymentProvider::RegionalGateway,
            &payload,
            &sign(WEBHOOK_SECRET, &payload),
        )
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::Processed(response) => {
            assert_eq!(response.status, TransactionStatus::Completed);
            assert_eq!(response.transaction_id, session.transaction_id);
        }
        other => panic!("Expected processed outcome, got {:?}", other),
    }
    assert_eq!(ctx.identity.activation_count(), 1);
}

#[tokio::test]
async fn test_invalid_signature_changes_nothing() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let payload = completed_body(&session.provider_reference, dec!(2.99), Currency::USD);
    let forged = sign("not-the-secret", &payload);

    assert_integrity(
        ctx.webhooks
            .handle(PaymentProvider::CardGateway, &payload, &forged)
            .await,
    );
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Pending).await;
    assert_eq!(ctx.identity.activation_count(), 0);
}

#[tokio::test]
async fn test_signature_must_cover_exact_body() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let signed = completed_body(&session.provider_reference, dec!(2.99), Currency::USD);
    let signature = sign(WEBHOOK_SECRET, &signed);
    let tampered = completed_body(&session.provider_reference, dec!(0.01), Currency::USD);

    assert_integrity(
        ctx.webhooks
            .handle(PaymentProvider::CardGateway, &tampered, &signature)
            .await,
    );
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Pending).await;
}

#[tokio::test]
async fn test_ignored_event() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let payload = webhook_body(&session.provider_reference, ProviderStatus::Ignored, None, None);
    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &payload, &sign(WEBHOOK_SECRET, &payload))
        .await
        .unwrap();

    assert!(matches!(outcome, WebhookOutcome::Ignored));
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Pending).await;
}

#[tokio::test]
async fn test_unknown_reference_is_acknowledged() {
    let ctx = TestContext::new();
    let payload = completed_body("cs_never_created", dec!(4.99), Currency::USD);

    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &payload, &sign(WEBHOOK_SECRET, &payload))
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::UnknownReference { reference } => assert_eq!(reference, "cs_never_created"),
        other => panic!("Expected unknown reference, got {:?}", other),
    }
}

#[tokio::test]
async fn test_webhook_from_other_provider_rejected() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let payload = completed_body(&session.provider_reference, dec!(2.99), Currency::USD);
    assert_integrity(
        ctx.webhooks
            .handle(PaymentProvider::WalletProvider, &payload, &sign(WEBHOOK_SECRET, &payload))
            .await,
    );
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Pending).await;
}

#[tokio::test]
async fn test_missing_secret_is_configuration_error() {
    let ctx = TestContext::with_settings(|settings| {
        settings.webhook_secrets.remove(&PaymentProvider::CardGateway);
    });
    let payload = completed_body("cs_1", dec!(4.99), Currency::USD);

    let err = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &payload, &sign(WEBHOOK_SECRET, &payload))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let ctx = TestContext::new();
    let payload = "{not json";

    assert_integrity(
        ctx.webhooks
            .handle(PaymentProvider::CardGateway, payload, &sign(WEBHOOK_SECRET, payload))
            .await,
    );
}

#[tokio::test]
async fn test_failed_event_marks_payment_failed() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleInterview, PaymentProvider::WalletProvider, Currency::GBP)
        .await;

    let payload = webhook_body(&session.provider_reference, ProviderStatus::Failed, None, None);
    ctx.webhooks
        .handle(PaymentProvider::WalletProvider, &payload, &sign(WEBHOOK_SECRET, &payload))
        .await
        .unwrap();

    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Failed).await;
    assert_eq!(ctx.identity.activation_count(), 0);
}

#[tokio::test]
async fn test_late_success_after_failure_is_ignored() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleInterview, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let failed = webhook_body(&session.provider_reference, ProviderStatus::Failed, None, None);
    ctx.webhooks
        .handle(PaymentProvider::CardGateway, &failed, &sign(WEBHOOK_SECRET, &failed))
        .await
        .unwrap();

    let completed = completed_body(&session.provider_reference, dec!(4.99), Currency::USD);
    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &completed, &sign(WEBHOOK_SECRET, &completed))
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::Processed(response) => {
            assert_eq!(response.status, TransactionStatus::Failed)
        }
        other => panic!("Expected processed outcome, got {:?}", other),
    }
    assert_eq!(ctx.identity.activation_count(), 0);
}

#[tokio::test]
async fn test_success_webhook_settles_processing_payment_after_expiry() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::CardGateway, Currency::USD)
        .await;

    let in_flight = webhook_body(&session.provider_reference, ProviderStatus::Processing, None, None);
    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &in_flight, &sign(WEBHOOK_SECRET, &in_flight))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Processed(ref response) if response.status == TransactionStatus::Processing
    ));

    ctx.lapse_session(&session.provider_reference).await;

    let paid = completed_body(&session.provider_reference, dec!(2.99), Currency::USD);
    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::CardGateway, &paid, &sign(WEBHOOK_SECRET, &paid))
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::Processed(response) => {
            assert_eq!(response.status, TransactionStatus::Completed);
            assert!(response.subscription_id.is_some());
        }
        other => panic!("Expected processed outcome, got {:?}", other),
    }
    assert_eq!(ctx.identity.activation_count(), 1);
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Completed).await;
}

#[tokio::test]
async fn test_redelivery_retries_failed_activation() {
    let ctx = TestContext::new();
    let session = ctx
        .open_session(ProductType::SingleCv, PaymentProvider::RegionalGateway, Currency::EGP)
        .await;
    let payload = completed_body(&session.provider_reference, dec!(89.99), Currency::EGP);
    let signature = sign(WEBHOOK_SECRET, &payload);

    ctx.identity.fail_activations(true);
    let err = ctx
        .webhooks
        .handle(PaymentProvider::RegionalGateway, &payload, &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_stored_status(&ctx, &session.provider_reference, TransactionStatus::Completed).await;

    ctx.identity.fail_activations(false);
    let outcome = ctx
        .webhooks
        .handle(PaymentProvider::RegionalGateway, &payload, &signature)
        .await
        .unwrap();

    match outcome {
        WebhookOutcome::Processed(response) => {
            assert_eq!(response.status, TransactionStatus::Completed);
            assert_eq!(response.subscription_id, Some(500));
        }
        other => panic!("Expected processed outcome, got {:?}", other),
    }
    assert_eq!(ctx.identity.activation_count(), 1);
    assert_eq!(ctx.identity.activation_calls(), 2);
}
