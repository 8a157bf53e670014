use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::core::{AppError, Currency};
use crate::modules::transactions::models::{CreateSessionRequest, VerifyPaymentRequest};
use crate::modules::transactions::services::PaymentService;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

impl CurrencyQuery {
    /// USD when omitted
    fn currency(&self) -> Result<Currency, AppError> {
        match self.currency.as_deref() {
            None | Some("") => Ok(Currency::USD),
            Some(raw) => raw.parse().map_err(AppError::Validation),
        }
    }
}

/// Create a checkout session
/// POST /payments/sessions
pub async fn create_session(
    service: web::Data<Arc<PaymentService>>,
    request: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, AppError> {
    let session = service.create_payment_session(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(session))
}

/// Verify a payment by poll or with a signed webhook body
/// POST /payments/verify
pub async fn verify_payment(
    service: web::Data<Arc<PaymentService>>,
    request: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let result = service.verify_payment(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /payments/{id}
pub async fn get_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let payment = service.get_payment(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(payment))
}

/// Paged payment history, newest first
/// GET /payments/history/{user_id}
pub async fn get_history(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<i64>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let history = service
        .get_user_payment_history(path.into_inner(), query.page, query.page_size)
        .await?;

    Ok(HttpResponse::Ok().json(history))
}

/// GET /payments/pricing?currency=
pub async fn list_pricing(
    service: web::Data<Arc<PaymentService>>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let currency = query.currency()?;

    Ok(HttpResponse::Ok().json(service.list_products(currency)))
}

/// GET /payments/providers
pub async fn list_providers(
    service: web::Data<Arc<PaymentService>>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service.list_providers()))
}

/// GET /payments/statistics?currency=
pub async fn get_statistics(
    service: web::Data<Arc<PaymentService>>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse, AppError> {
    let statistics = service.get_payment_statistics(query.currency()?).await?;

    Ok(HttpResponse::Ok().json(statistics))
}

/// Reset and re-verify a payment. Disabled unless unsafe operations are on.
/// POST /payments/{id}/force-activate
pub async fn force_activate(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let result = service.force_activate_payment(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    // fixed segments before /{id}
    cfg.service(
        web::scope("/payments")
            .route("/sessions", web::post().to(create_session))
            .route("/verify", web::post().to(verify_payment))
            .route("/history/{user_id}", web::get().to(get_history))
            .route("/pricing", web::get().to(list_pricing))
            .route("/providers", web::get().to(list_providers))
            .route("/statistics", web::get().to(get_statistics))
            .route("/{id}", web::get().to(get_payment))
            .route("/{id}/force-activate", web::post().to(force_activate)),
    );
}
