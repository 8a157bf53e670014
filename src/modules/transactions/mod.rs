pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{
    CreateSessionRequest, PaymentTransaction, PaymentVerificationResponse, TransactionStatus,
    VerifyPaymentRequest,
};
pub use repositories::{InMemoryTransactionStore, MySqlTransactionRepository, TransactionStore};
pub use services::{
    PaymentService, PaymentSettings, ReconciliationReport, ReconciliationSweep, WebhookHandler,
    WebhookOutcome,
};
