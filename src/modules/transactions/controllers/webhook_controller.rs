use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::core::{AppError, Result};
use crate::modules::providers::PaymentProvider;
use crate::modules::transactions::services::WebhookHandler;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    /// Paymob signs its transaction callbacks in the query string
    pub hmac: Option<String>,
}

/// Receive a provider notification
/// POST /webhooks/{provider}
///
/// Returns 200 once the event is applied or deliberately ignored, 400 when
/// the delivery can never succeed (bad signature, malformed body), and 5xx
/// for transient failures so the provider redelivers.
pub async fn receive_webhook(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<WebhookQuery>,
    body: web::Bytes,
    handler: web::Data<WebhookHandler>,
) -> Result<HttpResponse> {
    let provider: PaymentProvider = match path.into_inner().parse() {
        Ok(provider) => provider,
        Err(e) => return Err(AppError::not_found(e)),
    };

    let signature = extract_signature(&req, &query)
        .ok_or_else(|| AppError::validation("Missing webhook signature"))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::validation("Webhook body is not valid UTF-8"))?;

    info!(provider = %provider, bytes = body.len(), "Received webhook");

    match handler.handle(provider, payload, &signature).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "received": true,
            "result": outcome,
        }))),
        Err(e) if is_permanent(&e) => {
            warn!(provider = %provider, error = %e, "Rejected webhook");
            Ok(HttpResponse::BadRequest().json(json!({
                "received": false,
                "error": e.to_string(),
            })))
        }
        Err(e) => {
            error!(provider = %provider, error = %e, "Webhook processing failed");
            Err(e)
        }
    }
}

/// Stripe-Signature, then X-Webhook-Signature, then the `hmac` query param
fn extract_signature(req: &HttpRequest, query: &WebhookQuery) -> Option<String> {
    ["Stripe-Signature", "X-Webhook-Signature"]
        .iter()
        .find_map(|name| {
            req.headers()
                .get(*name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .or_else(|| query.hmac.clone().filter(|s| !s.trim().is_empty()))
}

/// Redelivering the same body cannot change these
fn is_permanent(error: &AppError) -> bool {
    matches!(
        error,
        AppError::Validation(_)
            | AppError::Integrity(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::Json(_)
    )
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhooks").route("/{provider}", web::post().to(receive_webhook)),
    );
}
