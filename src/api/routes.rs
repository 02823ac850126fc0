use crate::{
    api::{compliance, deliveries, gateway, health, systems},
    compliance::ComplianceEngine,
    delivery::DeliveryTracker,
    gateway::GatewayClient,
    observability::HealthChecker,
    rate_limit::RateLimiter,
    registry::SystemRegistry,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub registry: SystemRegistry,
    pub gateway: Arc<GatewayClient>,
    pub tracker: Arc<DeliveryTracker>,
    pub compliance: Arc<ComplianceEngine>,
    pub limiter: Arc<RateLimiter>,
    pub health_checker: Arc<HealthChecker>,
}

pub fn create_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health/startup", get(health::startup))
        .route("/metrics", get(health::metrics))
        // API v1 routes
        .nest("/v1", v1_routes())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

fn v1_routes() -> Router<AppState> {
    Router::new()
        // External system registry (administrative surface)
        .route("/systems", post(systems::register).get(systems::list))
        .route("/systems/:code", get(systems::get))
        .route("/systems/:code/active", put(systems::set_active))
        .route("/systems/:code/health-check", post(systems::health_check))
        .route("/systems/:code/statistics", get(systems::statistics))
        // Raw gateway execution for upstream services
        .route("/gateway/execute", post(gateway::execute))
        // Service delivery tracking
        .route(
            "/deliveries",
            post(deliveries::submit).get(deliveries::list),
        )
        .route("/deliveries/statistics", get(deliveries::statistics))
        .route("/deliveries/stuck", get(deliveries::stuck))
        .route("/deliveries/:transaction_id", get(deliveries::get))
        .route(
            "/deliveries/:transaction_id/confirm",
            post(deliveries::confirm),
        )
        .route(
            "/deliveries/:transaction_id/reconcile",
            post(deliveries::reconcile),
        )
        // Compliance validation
        .route("/compliance/validate", post(compliance::validate))
        .route("/compliance/records", get(compliance::records))
        .route(
            "/compliance/statistics/:standard",
            get(compliance::statistics),
        )
}
