pub mod dto;
pub mod payment_transaction;

pub use dto::{
    verification_message, CreateSessionRequest, DailyRevenue, PagedResult, PaymentHistoryItem,
    PaymentSessionResponse, PaymentStatistics, PaymentVerificationResponse, TransactionResponse,
    VerifyPaymentRequest,
};
pub use payment_transaction::{NewTransaction, PaymentTransaction, TransactionStatus};
