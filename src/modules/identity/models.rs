use serde::{Deserialize, Serialize};

use crate::modules::pricing::{BillingCycle, ProductType};

/// Who is paying, as known to the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
}

/// Request to grant premium access after a completed payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionActivation {
    pub user_id: i64,
    pub transaction_id: String,
    pub product_type: ProductType,
    pub billing_cycle: Option<BillingCycle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivatedSubscription {
    pub subscription_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    pub token: String,
}
