pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{RefundRequest, RefundStatus};
pub use repositories::{InMemoryRefundStore, MySqlRefundRepository, RefundStore};
pub use services::RefundService;
