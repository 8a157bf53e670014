pub mod payment_service;
pub mod reconciliation;
pub mod webhook_handler;

pub use payment_service::{PaymentService, PaymentSettings};
pub use reconciliation::{ReconciliationReport, ReconciliationSweep};
pub use webhook_handler::{WebhookHandler, WebhookOutcome};
