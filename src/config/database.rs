use std::time::Duration;

use serde::Deserialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::info;

use super::{parse_or, providers::required};
use crate::core::{AppError, Result};

/// MySQL store for payment transactions and refund requests
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 20u32)?;
        if max_connections == 0 {
            return Err(AppError::Configuration(
                "DATABASE_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        Ok(DatabaseConfig {
            url: required("DATABASE_URL")?,
            min_connections: parse_or("DATABASE_MIN_CONNECTIONS", 2u32)?.min(max_connections),
            max_connections,
            acquire_timeout_secs: parse_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64)?,
        })
    }

    pub async fn create_pool(&self) -> Result<MySqlPool> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(&self.url)
            .await?;

        info!(
            max_connections = self.max_connections,
            "Database pool ready"
        );
        Ok(pool)
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(pool: &MySqlPool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        info!("Database migrations applied");
        Ok(())
    }
}
