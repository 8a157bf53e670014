use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::paymob::PaymobStrategy;
use super::paypal::PayPalStrategy;
use super::strategy::PaymentStrategy;
use super::stripe::StripeStrategy;
use crate::config::Config;
use crate::core::{AppError, Currency, Result};
use crate::modules::providers::models::PaymentProvider;

/// Registry of the strategies this deployment is configured for
#[derive(Default)]
pub struct StrategyFactory {
    strategies: HashMap<PaymentProvider, Arc<dyn PaymentStrategy>>,
}

impl StrategyFactory {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register every provider that has credentials in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.payments.provider_timeout_secs);
        let mut factory = Self::new();

        if let Some(stripe) = &config.stripe {
            factory.register(Arc::new(StripeStrategy::new(stripe, timeout)?));
        }
        if let Some(paypal) = &config.paypal {
            factory.register(Arc::new(PayPalStrategy::new(paypal, timeout)?));
        }
        if let Some(paymob) = &config.paymob {
            factory.register(Arc::new(PaymobStrategy::new(paymob, timeout)?));
        }

        Ok(factory)
    }

    /// Register a strategy, replacing any earlier one for the same provider
    pub fn register(&mut self, strategy: Arc<dyn PaymentStrategy>) {
        let provider = strategy.provider();
        info!(provider = %provider, vendor = provider.vendor(), "Registering payment strategy");
        self.strategies.insert(provider, strategy);
    }

    /// Strategy for `provider`. A missing registration is a deployment error.
    pub fn resolve(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentStrategy>> {
        self.strategies.get(&provider).cloned().ok_or_else(|| {
            AppError::Configuration(format!(
                "No payment strategy registered for provider '{}'",
                provider
            ))
        })
    }

    pub fn is_supported(&self, provider: PaymentProvider) -> bool {
        self.strategies.contains_key(&provider)
    }

    /// Registered providers in a stable order
    pub fn supported_providers(&self) -> Vec<PaymentProvider> {
        PaymentProvider::ALL
            .into_iter()
            .filter(|provider| self.is_supported(*provider))
            .collect()
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.supported_providers()
            .into_iter()
            .filter_map(|provider| self.strategies.get(&provider))
            .map(|strategy| ProviderInfo {
                provider: strategy.provider(),
                vendor: strategy.provider().vendor().to_string(),
                supported_currencies: strategy.supported_currencies(),
            })
            .collect()
    }
}

/// Provider entry for listing
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub provider: PaymentProvider,
    pub vendor: String,
    pub supported_currencies: Vec<Currency>,
}
