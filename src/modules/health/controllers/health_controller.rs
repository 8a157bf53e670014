use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use crate::modules::transactions::services::PaymentService;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    /// Providers registered in this deployment
    pub providers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
}

/// GET /health - liveness, no dependency checks
pub async fn health_check(payments: Option<web::Data<Arc<PaymentService>>>) -> impl Responder {
    let providers = payments
        .map(|service| {
            service
                .list_providers()
                .into_iter()
                .map(|info| info.provider.to_string())
                .collect()
        })
        .unwrap_or_default();

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "careera-billing".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        providers,
    })
}

/// GET /ready - checks database connectivity
pub async fn readiness_check(pool: web::Data<MySqlPool>) -> impl Responder {
    let database = match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Database readiness check failed");
            false
        }
    };

    let response = ReadinessResponse {
        ready: database,
        database,
    };

    if response.ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
