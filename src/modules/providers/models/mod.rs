pub mod provider;

pub use provider::{PaymentMethod, PaymentProvider};
