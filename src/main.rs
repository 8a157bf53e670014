use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use careera_billing::config::{Config, DatabaseConfig};
use careera_billing::middleware::RequestId;
use careera_billing::modules::health::controllers::health_controller;
use careera_billing::modules::identity::HttpIdentityClient;
use careera_billing::providers::StrategyFactory;
use careera_billing::refunds::{MySqlRefundRepository, RefundService};
use careera_billing::transactions::{
    MySqlTransactionRepository, PaymentService, PaymentSettings, ReconciliationSweep,
    WebhookHandler,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "careera_billing=debug,actix_web=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.json_logs());
    config.validate().context("Configuration validation failed")?;

    tracing::info!(env = %config.app.env, "Starting Careera billing service");

    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;
    DatabaseConfig::migrate(&db_pool)
        .await
        .context("Failed to run migrations")?;

    let transactions = Arc::new(MySqlTransactionRepository::new(db_pool.clone()));
    let factory = Arc::new(StrategyFactory::from_config(&config)?);
    let identity = Arc::new(HttpIdentityClient::new(&config.identity)?);
    let settings = PaymentSettings::from_config(&config);
    let provider_timeout = settings.provider_timeout;

    let payments = Arc::new(PaymentService::new(
        transactions.clone(),
        factory.clone(),
        identity,
        settings,
    ));
    let webhooks = WebhookHandler::new(payments.clone());
    let refunds = Arc::new(RefundService::new(
        Arc::new(MySqlRefundRepository::new(db_pool.clone())),
        transactions,
        factory,
        provider_timeout,
    ));

    let sweep = Arc::new(ReconciliationSweep::new(
        payments.clone(),
        Duration::from_secs(config.payments.reconciliation_interval_secs),
        chrono::Duration::minutes(config.payments.webhook_window_minutes),
    ));
    tokio::spawn(sweep.start());

    let bind_address = config.server.bind_address();
    let cors_origin = config.payments.cors_allowed_origin.clone();

    let mut server = HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            None => Cors::default(),
        };

        App::new()
            .wrap(cors)
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(payments.clone()))
            .app_data(web::Data::new(webhooks.clone()))
            .app_data(web::Data::new(refunds.clone()))
            .configure(health_controller::configure)
            .configure(careera_billing::configure_api)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?;

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    tracing::info!(address = %bind_address, "Server started");

    server.run().await?;
    Ok(())
}
