//! Careera billing: payment transaction core
//!
//! Checkout sessions with Stripe, PayPal and Paymob, verification by poll or
//! webhook, subscription activation, refunds with admin review and a
//! reconciliation sweep for payments whose webhook never arrived.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

use actix_web::web;

// Re-export commonly used types
pub use modules::pricing;
pub use modules::providers;
pub use modules::refunds;
pub use modules::transactions;

/// Register every `/api` route. Services are expected as app data:
/// `Arc<PaymentService>`, `WebhookHandler` and `Arc<RefundService>`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(modules::transactions::controllers::payment_controller::configure)
            .configure(modules::transactions::controllers::webhook_controller::configure)
            .configure(modules::refunds::controllers::refund_controller::configure),
    );
}
