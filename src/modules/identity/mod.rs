pub mod http_client;
pub mod models;
pub mod service;

pub use http_client::HttpIdentityClient;
pub use models::{CustomerProfile, SubscriptionActivation};
pub use service::IdentityService;
