use crate::core::{AppError, Result};
use std::env;

/// Server configuration for HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` lets actix pick one worker per physical core
    pub workers: Option<usize>,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            workers: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid SERVER_PORT".to_string()))?;
        let workers = match env::var("SERVER_WORKERS") {
            Ok(raw) => Some(
                raw.parse::<usize>()
                    .ok()
                    .filter(|w| *w > 0)
                    .ok_or_else(|| AppError::Configuration("Invalid SERVER_WORKERS".to_string()))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            host,
            port,
            workers,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
