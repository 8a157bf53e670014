use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{ActivatedSubscription, CustomerProfile, IssuedToken, SubscriptionActivation};
use super::service::IdentityService;
use crate::config::IdentityConfig;
use crate::core::{AppError, Result};

/// Identity service reached over its internal HTTP API
pub struct HttpIdentityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn read<T: DeserializeOwned>(&self, what: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::internal(format!(
                "Identity service error for {} - HTTP {} ({})",
                what,
                status.as_u16(),
                body
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdentityService for HttpIdentityClient {
    async fn customer_profile(&self, user_id: i64) -> Result<CustomerProfile> {
        let url = format!("{}/internal/users/{}/profile", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        self.read(&format!("User {}", user_id), response).await
    }

    async fn activate_subscription(&self, activation: SubscriptionActivation) -> Result<i64> {
        let url = format!("{}/internal/subscriptions/activate", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Idempotency-Key", &activation.transaction_id)
            .json(&activation)
            .send()
            .await?;

        let activated: ActivatedSubscription = self
            .read(&format!("User {}", activation.user_id), response)
            .await?;

        debug!(
            user_id = activation.user_id,
            subscription_id = activated.subscription_id,
            "Subscription activated"
        );
        Ok(activated.subscription_id)
    }

    async fn issue_token(&self, user_id: i64) -> Result<String> {
        let url = format!("{}/internal/users/{}/token", self.base_url, user_id);
        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let issued: IssuedToken = self.read(&format!("User {}", user_id), response).await?;
        Ok(issued.token)
    }
}
