use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::core::{AppError, Result};

/// Build the HTTP client used by a provider adapter
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()?)
}

/// Map a transport failure to a provider error that names the vendor
pub(crate) fn transport_error(vendor: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::ProviderTimeout(format!("{} request timed out: {}", vendor, e))
    } else if e.is_connect() {
        AppError::provider(format!(
            "{} gateway unavailable: connection failed ({})",
            vendor, e
        ))
    } else {
        AppError::provider(format!("{} API request failed: {}", vendor, e))
    }
}

/// Read a provider response, turning non-2xx answers into descriptive errors
/// that keep the HTTP status for retry classification
pub(crate) async fn read_json<T: DeserializeOwned>(vendor: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::provider(format!("Failed to read {} response: {}", vendor, e)))?;

    if !status.is_success() {
        return Err(AppError::provider(format!(
            "{} API error - HTTP {} ({})",
            vendor,
            status.as_u16(),
            body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| AppError::provider(format!("Failed to parse {} response: {}", vendor, e)))
}

/// Non-retryable provider errors on a refund call are a rejection, not an outage
pub(crate) fn is_rejection(error: &AppError) -> bool {
    matches!(error, AppError::Provider(_)) && !error.is_retryable()
}
