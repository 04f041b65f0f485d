use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use databundle_backend::api;
use databundle_backend::config::AppConfig;
use databundle_backend::database;
use databundle_backend::database::catalog_repository::CatalogRepository;
use databundle_backend::database::payment_repository::PaymentRepository;
use databundle_backend::database::transaction_repository::TransactionRepository;
use databundle_backend::database::webhook_repository::WebhookRepository;
use databundle_backend::delivery::gladtidings::GladTidingsClient;
use databundle_backend::delivery::vendor::DataVendor;
use databundle_backend::health::{HealthChecker, HealthState, HealthStatus};
use databundle_backend::logging::init_tracing;
use databundle_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use databundle_backend::payments::ercaspay::ErcasPayGateway;
use databundle_backend::payments::gateway::PaymentGateway;
use databundle_backend::services::data_purchase::DataPurchaseService;
use databundle_backend::services::webhook_processor::WebhookProcessor;
use databundle_backend::workers::delivery_monitor::{DeliveryMonitorConfig, DeliveryMonitorWorker};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting databundle backend service"
    );

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!("📊 Initializing database connection pool...");
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;
    info!("✅ Database connection pool initialized");

    // Adapters are constructed once and injected; handlers and services
    // never reach for environment variables themselves.
    let gateway: Arc<dyn PaymentGateway> = Arc::new(ErcasPayGateway::from_env().map_err(|e| {
        error!("Failed to initialize ErcasPay gateway: {}", e);
        anyhow::anyhow!(e.to_string())
    })?);
    let vendor: Arc<dyn DataVendor> = Arc::new(GladTidingsClient::from_env().map_err(|e| {
        error!("Failed to initialize GladTidings client: {}", e);
        anyhow::anyhow!(e.to_string())
    })?);
    info!(
        gateway = gateway.name(),
        vendor = vendor.name(),
        "✅ External adapters initialized"
    );

    let transactions = Arc::new(TransactionRepository::new(db_pool.clone()));
    let payments = Arc::new(PaymentRepository::new(db_pool.clone()));
    let catalog = Arc::new(CatalogRepository::new(db_pool.clone()));
    let webhooks = Arc::new(WebhookRepository::new(db_pool.clone()));

    let purchases = Arc::new(DataPurchaseService::new(
        Arc::clone(&transactions),
        Arc::clone(&catalog),
        Arc::clone(&vendor),
    ));

    let webhook_processor = Arc::new(WebhookProcessor::new(
        Arc::clone(&webhooks),
        Arc::clone(&payments),
        Arc::clone(&transactions),
        Arc::clone(&gateway),
        Arc::clone(&purchases),
    ));

    let health_checker = HealthChecker::new(db_pool.clone(), Arc::clone(&vendor));

    // Delivery monitor re-drives paid transactions whose in-process delivery
    // task was lost
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let monitor_enabled = std::env::var("DELIVERY_MONITOR_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut monitor_handle = None;
    if monitor_enabled {
        let monitor_config = DeliveryMonitorConfig::from_env();
        let worker = DeliveryMonitorWorker::new(
            Arc::clone(&transactions),
            Arc::clone(&purchases),
            monitor_config,
        );
        monitor_handle = Some(tokio::spawn(worker.run(worker_shutdown_rx)));
        info!("✅ Delivery monitor worker started");
    } else {
        info!("Delivery monitor worker disabled (DELIVERY_MONITOR_ENABLED=false)");
    }

    info!("🛣️  Setting up application routes...");

    let catalog_routes = Router::new()
        .route("/api/data-plans/{network}", get(api::data_plans::list_plans))
        .with_state(Arc::new(api::data_plans::CatalogState {
            catalog: Arc::clone(&catalog),
        }));

    let transaction_routes = Router::new()
        .route("/api/transactions", post(api::transactions::create_transaction))
        .route(
            "/api/transactions/{id}/status",
            get(api::transactions::transaction_status),
        )
        .route(
            "/api/transactions/{id}/purchase-data",
            post(api::transactions::purchase_data),
        )
        .route(
            "/api/transactions/{id}/retry-data-purchase",
            post(api::transactions::retry_data_purchase),
        )
        .with_state(Arc::new(api::transactions::TransactionsState {
            transactions: Arc::clone(&transactions),
            catalog: Arc::clone(&catalog),
            purchases: Arc::clone(&purchases),
        }));

    let payment_routes = Router::new()
        .route(
            "/api/payments/initialize",
            post(api::payments::initialize_payment),
        )
        .route(
            "/api/payments/verify/{payment_reference}",
            get(api::payments::verify_payment_status),
        )
        .with_state(Arc::new(api::payments::PaymentsState {
            transactions: Arc::clone(&transactions),
            payments: Arc::clone(&payments),
            gateway: Arc::clone(&gateway),
            frontend_url: config.server.frontend_url.clone(),
        }));

    let webhook_routes = Router::new()
        .route(
            "/api/webhooks/ercaspay",
            post(api::webhooks::handle_ercaspay_webhook),
        )
        .route(
            "/api/webhooks/gladtidings",
            post(api::webhooks::handle_gladtidings_webhook),
        )
        .with_state(Arc::new(api::webhooks::WebhookState {
            processor: webhook_processor,
        }));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/health/ready", get(readiness))
        .route("/api/health/live", get(liveness))
        .with_state(AppState { health_checker });

    let app = Router::new()
        .merge(health_routes)
        .merge(catalog_routes)
        .merge(transaction_routes)
        .merge(payment_routes)
        .merge(webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);
    info!("✅ Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = monitor_handle {
        if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for delivery monitor shutdown");
        }
    }

    info!("👋 Server shutdown complete");
    Ok(())
}

// Application state for the health surface
#[derive(Clone)]
struct AppState {
    health_checker: HealthChecker,
}

async fn root() -> &'static str {
    "Welcome to the DataBundle Backend API"
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = state.health_checker.check_health().await;

    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("❌ Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(State(state)).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}
