use async_trait::async_trait;

use super::models::{CustomerProfile, SubscriptionActivation};
use crate::core::Result;

/// Port to the identity collaborator that owns users, roles and tokens
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Profile used to prefill the provider checkout. Unknown users are `NotFound`.
    async fn customer_profile(&self, user_id: i64) -> Result<CustomerProfile>;

    /// Grant the purchased entitlement and return the subscription id.
    ///
    /// Idempotent on `transaction_id`: repeating the call for the same
    /// payment returns the subscription granted the first time.
    async fn activate_subscription(&self, activation: SubscriptionActivation) -> Result<i64>;

    /// Mint a fresh access token carrying the user's new role
    async fn issue_token(&self, user_id: i64) -> Result<String>;
}
