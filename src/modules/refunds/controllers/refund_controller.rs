use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::AppError;
use crate::modules::refunds::models::{CreateRefundRequest, ReviewRefundRequest, StartReviewRequest};
use crate::modules::refunds::services::RefundService;

/// POST /refunds
pub async fn create_refund(
    service: web::Data<Arc<RefundService>>,
    request: web::Json<CreateRefundRequest>,
) -> Result<HttpResponse, AppError> {
    let refund = service.create_refund_request(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(refund))
}

/// GET /refunds/{id}
pub async fn get_refund(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let refund = service.get_refund(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(refund))
}

/// GET /refunds/user/{user_id}
pub async fn list_user_refunds(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let refunds = service.list_user_refunds(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(refunds))
}

/// Admin queue
/// GET /refunds/pending
pub async fn list_pending(
    service: web::Data<Arc<RefundService>>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service.list_pending_reviews().await?))
}

/// POST /refunds/{id}/start-review
pub async fn start_review(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<String>,
    request: web::Json<StartReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let refund = service
        .start_review(&path.into_inner(), request.admin_id)
        .await?;

    Ok(HttpResponse::Ok().json(refund))
}

/// POST /refunds/{id}/review
pub async fn review_refund(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<String>,
    request: web::Json<ReviewRefundRequest>,
) -> Result<HttpResponse, AppError> {
    let refund = service
        .review_refund(&path.into_inner(), request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(refund))
}

/// POST /refunds/{id}/process
pub async fn process_refund(
    service: web::Data<Arc<RefundService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let refund = service.process_refund(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(refund))
}

/// Configure refund routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/refunds")
            .route("", web::post().to(create_refund))
            .route("/pending", web::get().to(list_pending))
            .route("/user/{user_id}", web::get().to(list_user_refunds))
            .route("/{id}", web::get().to(get_refund))
            .route("/{id}/start-review", web::post().to(start_review))
            .route("/{id}/review", web::post().to(review_refund))
            .route("/{id}/process", web::post().to(process_refund)),
    );
}
