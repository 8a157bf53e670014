pub mod models;
pub mod services;

pub use models::{PaymentMethod, PaymentProvider};
pub use services::{
    with_provider_timeout, CreateSessionParams, PaymentStrategy, PaymobStrategy, PayPalStrategy,
    ProviderInfo, ProviderPaymentStatus, ProviderStatus, RefundParams, RefundResult,
    SessionResult, StrategyFactory, StripeStrategy, WebhookPaymentInfo,
};
