// External system registry: configuration and live health state for every
// integrated partner system.

use crate::config::RegistryConfig;
use crate::db::schema::{AuthScheme, ExternalSystem, IntegrationType, SystemType};
use crate::db::systems;
use crate::errors::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

// ============================================================================
// Registration input
// ============================================================================

/// A new system registration, validated before it reaches the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExternalSystem {
    pub system_code: String,
    pub system_name: String,
    pub organization: String,
    pub system_type: String,
    pub integration_type: String,
    pub environment: String,
    pub base_url: String,
    pub api_version: Option<String>,
    pub auth_type: String,
    pub credentials_ref: Option<String>,
    pub timeout_seconds: i32,
    pub rate_limit_per_minute: Option<i32>,
    pub rate_limit_per_hour: Option<i32>,
    pub rate_limit_per_day: Option<i32>,
}

impl NewExternalSystem {
    pub fn new(
        system_code: String,
        system_name: String,
        organization: String,
        base_url: String,
    ) -> Self {
        Self {
            system_code,
            system_name,
            organization,
            system_type: SystemType::GovernmentAgency.as_str().to_string(),
            integration_type: IntegrationType::RestApi.as_str().to_string(),
            environment: "DEVELOPMENT".to_string(),
            base_url,
            api_version: None,
            auth_type: AuthScheme::None.as_str().to_string(),
            credentials_ref: None,
            timeout_seconds: 30,
            rate_limit_per_minute: None,
            rate_limit_per_hour: None,
            rate_limit_per_day: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.system_code.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "System code cannot be empty".to_string(),
            ));
        }

        if self.system_name.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "System name cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GatewayError::ValidationError(
                "Base URL must be an http(s) endpoint".to_string(),
            ));
        }

        if SystemType::from_str(&self.system_type).is_none() {
            return Err(GatewayError::ValidationError(format!(
                "Unknown system type: {}",
                self.system_type
            )));
        }

        if IntegrationType::from_str(&self.integration_type).is_none() {
            return Err(GatewayError::ValidationError(format!(
                "Unknown integration type: {}",
                self.integration_type
            )));
        }

        let scheme = AuthScheme::from_str(&self.auth_type).ok_or_else(|| {
            GatewayError::ValidationError(format!(
                "Unknown authentication scheme: {}",
                self.auth_type
            ))
        })?;

        // Schemes that need credentials must reference them
        if !matches!(scheme, AuthScheme::None | AuthScheme::MutualTls)
            && self.credentials_ref.is_none()
        {
            return Err(GatewayError::ValidationError(format!(
                "Authentication scheme {} requires a credentials reference",
                self.auth_type
            )));
        }

        if self.timeout_seconds <= 0 {
            return Err(GatewayError::ValidationError(
                "Timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Directory seam for the gateway client
// ============================================================================

/// The two operations the gateway client needs from the registry: resolving
/// a target and recording the outcome of a call. Split out as a trait so
/// client tests can run against an in-memory directory.
#[async_trait]
pub trait SystemDirectory: Send + Sync {
    /// Resolve an available system by code. `SystemNotFound` when unknown,
    /// `SystemDisabled` when registered but not accepting traffic.
    async fn resolve(&self, code: &str) -> Result<ExternalSystem>;

    /// Record one call outcome against the system's counters
    async fn record_call_outcome(&self, code: &str, success: bool, latency_ms: f64) -> Result<()>;
}

// ============================================================================
// Registry
// ============================================================================

/// Postgres-backed registry of external systems
#[derive(Clone)]
pub struct SystemRegistry {
    pool: PgPool,
    config: RegistryConfig,
}

impl SystemRegistry {
    pub fn new(pool: PgPool, config: RegistryConfig) -> Self {
        Self { pool, config }
    }

    /// Register a new external system. System codes are never reused:
    /// a duplicate registration is a conflict even against a disabled entry.
    pub async fn register(&self, system: NewExternalSystem) -> Result<ExternalSystem> {
        system.validate()?;

        tracing::info!(
            system = %system.system_code,
            organization = %system.organization,
            "Registering external system"
        );

        systems::insert(&self.pool, &system).await
    }

    /// Fetch a system by code regardless of its state
    pub async fn get(&self, code: &str) -> Result<ExternalSystem> {
        systems::get_by_code(&self.pool, code)
            .await?
            .ok_or_else(|| GatewayError::SystemNotFound(code.to_string()))
    }

    /// All systems currently accepting traffic
    pub async fn list_active(&self) -> Result<Vec<ExternalSystem>> {
        systems::list(&self.pool, None, None, true).await
    }

    /// Admin listing with optional filters
    pub async fn list(
        &self,
        status: Option<&str>,
        system_type: Option<&str>,
    ) -> Result<Vec<ExternalSystem>> {
        systems::list(&self.pool, status, system_type, false).await
    }

    /// Record a health check outcome. This is the only path, besides the
    /// administrative toggle, that changes a system's lifecycle status.
    pub async fn mark_health_checked(&self, code: &str, healthy: bool) -> Result<()> {
        systems::mark_health_checked(&self.pool, code, healthy).await
    }

    /// Administrative enable/disable
    pub async fn set_active(&self, code: &str, active: bool) -> Result<ExternalSystem> {
        tracing::info!(system = %code, active = %active, "Toggling external system");
        systems::set_active(&self.pool, code, active).await
    }

    /// Derived health classification for a system
    pub fn is_unhealthy(&self, system: &ExternalSystem) -> bool {
        system.is_unhealthy(self.config.unhealthy_failure_rate_threshold)
    }
}

#[async_trait]
impl SystemDirectory for SystemRegistry {
    async fn resolve(&self, code: &str) -> Result<ExternalSystem> {
        let system = self.get(code).await?;

        if !system.is_available() {
            return Err(GatewayError::SystemDisabled(code.to_string()));
        }

        Ok(system)
    }

    async fn record_call_outcome(&self, code: &str, success: bool, latency_ms: f64) -> Result<()> {
        systems::record_call_outcome(&self.pool, code, success, latency_ms).await
    }
}
