pub mod health;
pub mod identity;
pub mod pricing;
pub mod providers;
pub mod refunds;
pub mod transactions;
