pub(crate) mod http;
pub mod paymob;
pub mod paypal;
pub mod signature;
pub mod strategy;
pub mod strategy_factory;
pub mod stripe;

pub use paymob::PaymobStrategy;
pub use paypal::PayPalStrategy;
pub use strategy::{
    with_provider_timeout, CreateSessionParams, PaymentStrategy, ProviderPaymentStatus,
    ProviderStatus, RefundParams, RefundResult, SessionResult, WebhookPaymentInfo,
};
pub use strategy_factory::{ProviderInfo, StrategyFactory};
pub use stripe::StripeStrategy;
