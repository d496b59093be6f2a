use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use paylink_backend::api;
use paylink_backend::api::auth::AuthState;
use paylink_backend::api::payments::PaymentsState;
use paylink_backend::api::webhooks::WebhookState;
use paylink_backend::config::AppConfig;
use paylink_backend::database::transaction_repository::{
    PgTransactionRepository, TransactionStore,
};
use paylink_backend::database::user_repository::{PgUserRepository, UserStore};
use paylink_backend::database::{init_pool_from_config, run_migrations};
use paylink_backend::health::{HealthChecker, HealthStatus};
use paylink_backend::logging::init_tracing;
use paylink_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use paylink_backend::payments::gateway::PaymentGateway;
use paylink_backend::payments::paystack::PaystackGateway;
use paylink_backend::services::identity::{IdentityResolver, OAuthClient};
use paylink_backend::services::payment_orchestrator::PaymentOrchestrator;

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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting Paylink backend service"
    );

    info!("Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        e
    })?;
    run_migrations(&db_pool).await?;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::from_env().map_err(|e| {
        error!("Failed to initialize payment gateway: {}", e);
        e
    })?);
    info!(provider = gateway.name(), "Payment gateway initialized");

    let oauth = Arc::new(OAuthClient::from_env().map_err(|e| {
        error!("Failed to initialize OAuth client: {}", e);
        e
    })?);

    let transactions: Arc<dyn TransactionStore> =
        Arc::new(PgTransactionRepository::new(db_pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserRepository::new(db_pool.clone()));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        transactions,
        gateway,
        config.payments.clone(),
    ));
    let resolver = Arc::new(IdentityResolver::new(users));
    let health_checker = HealthChecker::new(db_pool.clone());

    info!("Setting up application routes...");
    let auth_routes = Router::new()
        .route("/auth/login", get(api::auth::login))
        .route("/auth/callback", get(api::auth::callback))
        .with_state(Arc::new(AuthState { oauth, resolver }));

    let payment_routes = Router::new()
        .route("/payments/initiate", post(api::payments::initiate_payment))
        .route(
            "/payments/{reference}/status",
            get(api::payments::get_payment_status),
        )
        .with_state(Arc::new(PaymentsState {
            orchestrator: orchestrator.clone(),
        }));

    let webhook_routes = Router::new()
        .route("/payments/webhook", post(api::webhooks::handle_webhook))
        .with_state(Arc::new(WebhookState { orchestrator }));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker);

    let app = Router::new()
        .route("/", get(root))
        .merge(auth_routes)
        .merge(payment_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn root() -> &'static str {
    "Welcome to Paylink Backend API"
}

async fn health(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = checker.check_health().await;

    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        error!("Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(State(checker)).await
}

/// Liveness probe - checks if the service is alive
async fn liveness() -> &'static str {
    "OK"
}
