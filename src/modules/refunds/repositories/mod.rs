pub mod in_memory;
pub mod refund_repository;

pub use in_memory::InMemoryRefundStore;
pub use refund_repository::{MySqlRefundRepository, RefundStore};
