pub mod dto;
pub mod refund_request;

pub use dto::{CreateRefundRequest, RefundResponse, ReviewRefundRequest, StartReviewRequest};
pub use refund_request::{RefundRequest, RefundStatus};
