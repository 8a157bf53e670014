// Identity service that records every activation
//
// Activations are idempotent per transaction id, like the real service:
// a repeated call returns the subscription granted the first time.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use careera_billing::core::{AppError, Result};
use careera_billing::modules::identity::{CustomerProfile, IdentityService, SubscriptionActivation};

pub struct RecordingIdentity {
    activations: Mutex<Vec<(SubscriptionActivation, i64)>>,
    activation_calls: AtomicUsize,
    next_subscription_id: AtomicI64,
    fail_activation: AtomicBool,
    fail_token: AtomicBool,
}

impl Default for RecordingIdentity {
    fn default() -> Self {
        Self {
            activations: Mutex::new(Vec::new()),
            activation_calls: AtomicUsize::new(0),
            next_subscription_id: AtomicI64::new(500),
            fail_activation: AtomicBool::new(false),
            fail_token: AtomicBool::new(false),
        }
    }
}

impl RecordingIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct activations granted
    pub fn activations(&self) -> Vec<SubscriptionActivation> {
        self.activations
            .lock()
            .unwrap()
            .iter()
            .map(|(activation, _)| activation.clone())
            .collect()
    }

    pub fn activation_count(&self) -> usize {
        self.activations.lock().unwrap().len()
    }

    /// Every call, including failed and repeated ones
    pub fn activation_calls(&self) -> usize {
        self.activation_calls.load(Ordering::SeqCst)
    }

    pub fn fail_activations(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tokens(&self, fail: bool) {
        self.fail_token.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityService for RecordingIdentity {
    async fn customer_profile(&self, user_id: i64) -> Result<CustomerProfile> {
        if user_id <= 0 {
            return Err(AppError::not_found(format!("User {}", user_id)));
        }

        Ok(CustomerProfile {
            user_id,
            email: format!("user{}@careera.test", user_id),
            full_name: format!("Test User {}", user_id),
        })
    }

    async fn activate_subscription(&self, activation: SubscriptionActivation) -> Result<i64> {
        self.activation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(AppError::internal("Identity service unavailable"));
        }

        let mut activations = self.activations.lock().unwrap();
        if let Some((_, subscription_id)) = activations
            .iter()
            .find(|(granted, _)| granted.transaction_id == activation.transaction_id)
        {
            return Ok(*subscription_id);
        }

        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        activations.push((activation, subscription_id));
        Ok(subscription_id)
    }

    async fn issue_token(&self, user_id: i64) -> Result<String> {
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(AppError::internal("Token service unavailable"));
        }

        Ok(format!("token-for-{}", user_id))
    }
}
