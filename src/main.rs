use interop_gateway::{
    api::{create_router, AppState},
    compliance::{ComplianceEngine, PostgresComplianceSink},
    config::Config,
    db::{create_pool, run_migrations},
    delivery::{spawn_reconciliation_sweep, spawn_retry_sweep, DeliveryTracker},
    gateway::GatewayClient,
    observability::{init_tracing, HealthChecker},
    rate_limit::RateLimiter,
    redis::create_client,
    registry::SystemRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    tracing::info!("Starting interoperability gateway");
    tracing::info!("Configuration loaded: {:?}", config.server);

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;

    // Create Redis connection
    let redis_manager = create_client(&config.redis).await?;

    // Wire up the interoperability core
    let registry = SystemRegistry::new(db_pool.clone(), config.registry.clone());
    let limiter = Arc::new(RateLimiter::new(redis_manager.clone()));

    let gateway = Arc::new(
        GatewayClient::new(Arc::new(registry.clone()), config.gateway.clone())?
            .with_rate_limiter(limiter.clone()),
    );

    let tracker = Arc::new(DeliveryTracker::new(
        db_pool.clone(),
        gateway.clone(),
        config.delivery.clone(),
    ));

    let compliance = Arc::new(ComplianceEngine::new(
        config.compliance.clone(),
        Arc::new(PostgresComplianceSink::new(db_pool.clone())),
    ));

    // Background sweeps: retry and reconciliation
    spawn_retry_sweep(tracker.clone(), &config.delivery);
    spawn_reconciliation_sweep(tracker.clone(), &config.delivery);

    let health_checker = Arc::new(HealthChecker::new(db_pool.clone(), redis_manager.clone()));

    let state = AppState {
        db_pool,
        registry,
        gateway,
        tracker,
        compliance,
        limiter,
        health_checker,
    };

    let app = create_router(state);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Interoperability gateway is ready to accept requests");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
