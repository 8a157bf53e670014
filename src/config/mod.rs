use crate::core::{AppError, Result};
use crate::modules::pricing::DiscountPolicy;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod providers;
pub mod server;

pub use database::DatabaseConfig;
pub use providers::{PayPalConfig, PaymobConfig, StripeConfig};
pub use server::ServerConfig;

use providers::{optional, required};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub payments: PaymentsConfig,
    pub stripe: Option<StripeConfig>,
    pub paypal: Option<PayPalConfig>,
    pub paymob: Option<PaymobConfig>,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `json` for structured output, anything else for human-readable
    pub log_format: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub provider_timeout_secs: u64,
    pub allow_unsafe_operations: bool,
    /// From `DISCOUNT_CODES`, e.g. `LAUNCH20:20,FRIENDS:15`
    pub discounts: DiscountPolicy,
    pub reconciliation_interval_secs: u64,
    pub webhook_window_minutes: i64,
    pub cors_allowed_origin: Option<String>,
}

/// Internal identity service
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", name))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            payments: PaymentsConfig {
                provider_timeout_secs: parse_or("PROVIDER_TIMEOUT_SECS", 15)?,
                allow_unsafe_operations: parse_or("ALLOW_UNSAFE_OPERATIONS", false)?,
                discounts: DiscountPolicy::parse(
                    &optional("DISCOUNT_CODES").unwrap_or_default(),
                )?,
                reconciliation_interval_secs: parse_or("RECONCILIATION_INTERVAL_SECS", 300)?,
                webhook_window_minutes: parse_or("WEBHOOK_WINDOW_MINUTES", 10)?,
                cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            },
            stripe: StripeConfig::from_env()?,
            paypal: PayPalConfig::from_env()?,
            paymob: PaymobConfig::from_env()?,
            identity: IdentityConfig {
                base_url: required("IDENTITY_BASE_URL")?,
                api_key: required("IDENTITY_API_KEY")?,
                timeout_secs: parse_or("IDENTITY_TIMEOUT_SECS", 10)?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.stripe.is_none() && self.paypal.is_none() && self.paymob.is_none() {
            return Err(AppError::Configuration(
                "At least one payment provider must be configured".to_string(),
            ));
        }

        if self.payments.provider_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Provider timeout must be greater than 0".to_string(),
            ));
        }

        if self.payments.reconciliation_interval_secs == 0 {
            return Err(AppError::Configuration(
                "Reconciliation interval must be greater than 0".to_string(),
            ));
        }

        if self.payments.webhook_window_minutes <= 0 {
            return Err(AppError::Configuration(
                "Webhook window must be greater than 0".to_string(),
            ));
        }

        if self.payments.allow_unsafe_operations && self.app.is_production() {
            return Err(AppError::Configuration(
                "ALLOW_UNSAFE_OPERATIONS cannot be enabled in production".to_string(),
            ));
        }

        Ok(())
    }
}
