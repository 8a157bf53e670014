// Provider adapters and the identity client against mocked HTTP APIs

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use careera_billing::config::{IdentityConfig, PayPalConfig, PaymobConfig, StripeConfig};
use careera_billing::core::{AppError, Currency, Money};
use careera_billing::modules::identity::{
    CustomerProfile, HttpIdentityClient, IdentityService, SubscriptionActivation,
};
use careera_billing::pricing::{BillingCycle, ProductType};
use careera_billing::providers::{
    CreateSessionParams, PaymentStrategy, PaymobStrategy, PayPalStrategy, ProviderStatus,
    RefundParams, StripeStrategy,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn session_params(amount: Money, product_type: ProductType, billing_cycle: BillingCycle) -> CreateSessionParams {
    CreateSessionParams {
        user_id: 42,
        amount,
        product_type,
        billing_cycle,
        customer_email: "candidate@careera.test".to_string(),
        customer_name: "Nour El Din".to_string(),
        success_url: "https://app.careera.test/payment/success".to_string(),
        cancel_url: "https://app.careera.test/payment/cancel".to_string(),
        metadata: HashMap::new(),
    }
}

fn refund_params(reference: &str, amount: Money) -> RefundParams {
    RefundParams {
        provider_reference: reference.to_string(),
        amount,
        reason: "The interview slot was never scheduled".to_string(),
        idempotency_key: "refund-1".to_string(),
    }
}

mod stripe {
    use super::*;

    fn strategy(server: &MockServer) -> StripeStrategy {
        StripeStrategy::new(
            &StripeConfig {
                secret_key: "sk_test_123".to_string(),
                webhook_secret: "whsec_test".to_string(),
                base_url: server.uri(),
            },
            TIMEOUT,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_subscription_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_123"))
            .and(body_string_contains("mode=subscription"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "status": "open",
                "payment_status": "unpaid",
                "amount_total": 1399,
                "currency": "usd",
                "expires_at": 1_900_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = strategy(&server)
            .create_session(session_params(
                Money::new(dec!(13.99), Currency::USD).unwrap(),
                ProductType::BundleSubscription,
                BillingCycle::Monthly,
            ))
            .await
            .unwrap();

        assert_eq!(session.provider_reference, "cs_test_1");
        assert_eq!(session.checkout_url, "https://checkout.stripe.com/c/pay/cs_test_1");
        assert_eq!(session.expires_at.timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_paid_session_is_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "status": "complete",
                "payment_status": "paid",
                "amount_total": 499,
                "currency": "usd",
                "payment_method_types": ["card"]
            })))
            .mount(&server)
            .await;

        let status = strategy(&server).get_payment_status("cs_test_1").await.unwrap();
        assert_eq!(status.status, ProviderStatus::Completed);
        assert_eq!(status.amount, Some(dec!(4.99)));
        assert_eq!(status.currency, Some(Currency::USD));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = strategy(&server).get_payment_status("cs_test_1").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_refund_sends_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "status": "complete",
                "payment_status": "paid",
                "payment_intent": "pi_123"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(header("Idempotency-Key", "refund-1"))
            .and(body_string_contains("payment_intent=pi_123"))
            .and(body_string_contains("amount=250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "re_1",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "cs_test_1",
                Money::new(dec!(2.50), Currency::USD).unwrap(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_reference.as_deref(), Some("re_1"));
    }

    #[tokio::test]
    async fn test_subscription_refund_uses_invoice_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_sub_1"))
            .and(query_param("expand[]", "invoice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_sub_1",
                "mode": "subscription",
                "status": "complete",
                "payment_status": "paid",
                "payment_intent": null,
                "invoice": {
                    "id": "in_1",
                    "payment_intent": "pi_sub_1",
                    "charge": "ch_sub_1"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_string_contains("payment_intent=pi_sub_1"))
            .and(body_string_contains("amount=1399"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "re_sub_1",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "cs_sub_1",
                Money::new(dec!(13.99), Currency::USD).unwrap(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_reference.as_deref(), Some("re_sub_1"));
    }

    #[tokio::test]
    async fn test_subscription_refund_fetches_unexpanded_invoice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_sub_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_sub_2",
                "payment_intent": null,
                "invoice": "in_2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/invoices/in_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "in_2",
                "payment_intent": null,
                "charge": "ch_2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_string_contains("charge=ch_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "re_2",
                "status": "pending"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "cs_sub_2",
                Money::new(dec!(13.99), Currency::USD).unwrap(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_reference.as_deref(), Some("re_2"));
    }

    #[tokio::test]
    async fn test_refund_client_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_intent": "pi_123"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Charge has already been refunded." }
            })))
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "cs_test_1",
                Money::new(dec!(2.50), Currency::USD).unwrap(),
            ))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("HTTP 400"));
    }
}

mod paypal {
    use super::*;

    fn strategy(server: &MockServer) -> PayPalStrategy {
        PayPalStrategy::new(
            &PayPalConfig {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                webhook_secret: "whsec_paypal".to_string(),
                base_url: server.uri(),
            },
            TIMEOUT,
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA",
                "token_type": "Bearer",
                "expires_in": 32400
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn captured_order() -> serde_json::Value {
        json!({
            "id": "ORDER-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "amount": { "currency_code": "EUR", "value": "9.99" },
                "payments": {
                    "captures": [{
                        "id": "CAPTURE-1",
                        "status": "COMPLETED",
                        "create_time": "2026-10-01T10:00:00Z"
                    }]
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_create_order_returns_approval_link() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(header("Authorization", "Bearer A21AA"))
            .and(body_partial_json(json!({
                "intent": "CAPTURE",
                "purchase_units": [{ "amount": { "currency_code": "EUR", "value": "9.99" } }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "ORDER-1",
                "status": "CREATED",
                "links": [
                    { "href": "https://api.paypal.test/v2/checkout/orders/ORDER-1", "rel": "self" },
                    { "href": "https://www.paypal.test/checkoutnow?token=ORDER-1", "rel": "approve" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = strategy(&server)
            .create_session(session_params(
                Money::new(dec!(9.99), Currency::EUR).unwrap(),
                ProductType::InterviewerSubscription,
                BillingCycle::Monthly,
            ))
            .await
            .unwrap();

        assert_eq!(session.provider_reference, "ORDER-1");
        assert_eq!(session.checkout_url, "https://www.paypal.test/checkoutnow?token=ORDER-1");
    }

    #[tokio::test]
    async fn test_approved_order_is_captured_on_poll() {
        let server = MockServer::start().await;
        // token is cached across both calls
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v2/checkout/orders/ORDER-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ORDER-1",
                "status": "APPROVED",
                "purchase_units": [{ "amount": { "currency_code": "EUR", "value": "9.99" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-1/capture"))
            .and(header("PayPal-Request-Id", "capture-ORDER-1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(captured_order()))
            .expect(1)
            .mount(&server)
            .await;

        let status = strategy(&server).get_payment_status("ORDER-1").await.unwrap();

        assert_eq!(status.status, ProviderStatus::Completed);
        assert_eq!(status.amount, Some(dec!(9.99)));
        assert_eq!(status.currency, Some(Currency::EUR));
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_refund_targets_capture() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v2/checkout/orders/ORDER-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(captured_order()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/payments/captures/CAPTURE-1/refund"))
            .and(header("PayPal-Request-Id", "refund-1"))
            .and(body_partial_json(json!({
                "amount": { "currency_code": "EUR", "value": "5.00" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "REFUND-1",
                "status": "COMPLETED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "ORDER-1",
                Money::new(dec!(5), Currency::EUR).unwrap(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_reference.as_deref(), Some("REFUND-1"));
    }
}

mod paymob {
    use super::*;

    fn strategy(server: &MockServer) -> PaymobStrategy {
        PaymobStrategy::new(
            &PaymobConfig {
                api_key: "paymob_key".to_string(),
                hmac_secret: "paymob_hmac".to_string(),
                integration_id: 123,
                iframe_id: 456,
                base_url: server.uri(),
            },
            TIMEOUT,
        )
        .unwrap()
    }

    async fn mount_auth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/tokens"))
            .and(body_partial_json(json!({ "api_key": "paymob_key" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "auth_tok" })))
            .mount(server)
            .await;
    }

    fn paid_transaction() -> serde_json::Value {
        json!({
            "id": 9001,
            "success": true,
            "pending": false,
            "amount_cents": 3000,
            "currency": "EGP",
            "created_at": "2026-10-01T10:00:00.000000",
            "order": { "id": 555, "merchant_order_id": "m-1" },
            "source_data": { "type": "card" }
        })
    }

    #[tokio::test]
    async fn test_create_session_builds_iframe_url() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/ecommerce/orders"))
            .and(body_partial_json(json!({ "amount_cents": 3000, "currency": "EGP" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 555 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/acceptance/payment_keys"))
            .and(body_partial_json(json!({ "order_id": 555, "integration_id": 123 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "pay_tok" })))
            .expect(1)
            .mount(&server)
            .await;

        let session = strategy(&server)
            .create_session(session_params(
                Money::new(dec!(30.00), Currency::EGP).unwrap(),
                ProductType::BundleSubscription,
                BillingCycle::Monthly,
            ))
            .await
            .unwrap();

        assert_eq!(session.provider_reference, "555");
        assert_eq!(
            session.checkout_url,
            format!("{}/api/acceptance/iframes/456?payment_token=pay_tok", server.uri())
        );
    }

    #[tokio::test]
    async fn test_unpaid_order_is_pending() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/ecommerce/orders/transaction_inquiry"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let status = strategy(&server).get_payment_status("555").await.unwrap();
        assert_eq!(status.status, ProviderStatus::Pending);
    }

    #[tokio::test]
    async fn test_paid_order_is_completed() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/ecommerce/orders/transaction_inquiry"))
            .and(body_partial_json(json!({ "auth_token": "auth_tok", "order_id": 555 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(paid_transaction()))
            .mount(&server)
            .await;

        let status = strategy(&server).get_payment_status("555").await.unwrap();
        assert_eq!(status.status, ProviderStatus::Completed);
        assert_eq!(status.amount, Some(dec!(30.00)));
        assert_eq!(status.currency, Some(Currency::EGP));
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_non_numeric_reference_rejected() {
        let server = MockServer::start().await;
        mount_auth(&server).await;

        let err = strategy(&server).get_payment_status("cs_abc").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_refund_by_transaction_id() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/ecommerce/orders/transaction_inquiry"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paid_transaction()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/acceptance/void_refund/refund"))
            .and(body_partial_json(json!({ "transaction_id": 9001, "amount_cents": 1500 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 9002,
                "success": true,
                "pending": false,
                "amount_cents": 1500,
                "currency": "EGP"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server)
            .process_refund(refund_params(
                "555",
                Money::new(dec!(15.00), Currency::EGP).unwrap(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_reference.as_deref(), Some("9002"));
    }
}

mod identity {
    use super::*;

    fn client(server: &MockServer) -> HttpIdentityClient {
        HttpIdentityClient::new(&IdentityConfig {
            base_url: server.uri(),
            api_key: "internal-key".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_customer_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/42/profile"))
            .and(header("X-Api-Key", "internal-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_id": 42,
                "email": "candidate@careera.test",
                "full_name": "Nour El Din"
            })))
            .mount(&server)
            .await;

        let profile = client(&server).customer_profile(42).await.unwrap();
        assert_eq!(
            profile,
            CustomerProfile {
                user_id: 42,
                email: "candidate@careera.test".to_string(),
                full_name: "Nour El Din".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/7/profile"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).customer_profile(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_activate_subscription_and_issue_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/subscriptions/activate"))
            .and(header("Idempotency-Key", "tx-1"))
            .and(body_partial_json(json!({
                "user_id": 42,
                "transaction_id": "tx-1",
                "product_type": "bundle_subscription"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "subscription_id": 77 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/internal/users/42/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt.token" })))
            .mount(&server)
            .await;

        let client = client(&server);
        let subscription_id = client
            .activate_subscription(SubscriptionActivation {
                user_id: 42,
                transaction_id: "tx-1".to_string(),
                product_type: ProductType::BundleSubscription,
                billing_cycle: Some(BillingCycle::Monthly),
            })
            .await
            .unwrap();
        assert_eq!(subscription_id, 77);
        assert_eq!(client.issue_token(42).await.unwrap(), "jwt.token");
    }

    #[tokio::test]
    async fn test_identity_outage_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/users/42/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).issue_token(42).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
