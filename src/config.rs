use crate::errors::{GatewayError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub gateway: GatewayConfig,
    pub registry: RegistryConfig,
    pub delivery: DeliveryConfig,
    pub compliance: ComplianceConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Default per-call timeout when neither the request nor the
    /// registered system overrides it.
    pub default_timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Failure rate (0.0-1.0) over the call counters above which a system
    /// is classified unhealthy.
    pub unhealthy_failure_rate_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub max_retries: u32,
    pub retry_backoff_base_seconds: u64,
    pub retry_backoff_cap_seconds: u64,
    pub duplicate_window_hours: i64,
    pub reconciliation_threshold_hours: i64,
    pub retry_sweep_interval_seconds: u64,
    pub reconciliation_sweep_interval_seconds: u64,
    /// Path on the target system that receives delivery submissions.
    pub submission_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    pub fhir: FhirConfig,
    pub oidc: OidcConfig,
    pub gdpr: GdprConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirConfig {
    pub enabled: bool,
    pub strict_mode: bool,
    pub fhir_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    pub enabled: bool,
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GdprConfig {
    pub enabled: bool,
    pub strict_mode: bool,
    /// Retention periods longer than this draw a warning.
    pub max_retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Determine environment
        let environment =
            env::var("INTEROP_GATEWAY_ENV").unwrap_or_else(|_| "development".to_string());

        // Build configuration
        let config = config::Config::builder()
            // Start with default config
            .add_source(config::File::with_name("config/default"))
            // Add environment-specific config
            .add_source(config::File::with_name(&format!("config/{}", environment)).required(false))
            // Add environment variables with prefix INTEROP_GATEWAY
            // e.g., INTEROP_GATEWAY__SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix("INTEROP_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        // Deserialize into our Config struct
        config
            .try_deserialize()
            .map_err(|e| GatewayError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GatewayError::Configuration(
                "Invalid port number".to_string(),
            ));
        }

        if self.database.url.is_empty() {
            return Err(GatewayError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.redis.url.is_empty() {
            return Err(GatewayError::Configuration(
                "Redis URL is required".to_string(),
            ));
        }

        if self.gateway.default_timeout_seconds == 0 {
            return Err(GatewayError::Configuration(
                "Gateway default timeout must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.registry.unhealthy_failure_rate_threshold) {
            return Err(GatewayError::Configuration(
                "Unhealthy failure rate threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.delivery.retry_backoff_base_seconds == 0 {
            return Err(GatewayError::Configuration(
                "Retry backoff base must be positive".to_string(),
            ));
        }

        if self.delivery.retry_backoff_cap_seconds < self.delivery.retry_backoff_base_seconds {
            return Err(GatewayError::Configuration(
                "Retry backoff cap must be at least the base delay".to_string(),
            ));
        }

        if self.delivery.duplicate_window_hours <= 0 {
            return Err(GatewayError::Configuration(
                "Duplicate detection window must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/interop_gateway".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 5,
                idle_timeout_seconds: 300,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                connection_timeout_seconds: 5,
            },
            gateway: GatewayConfig {
                default_timeout_seconds: 30,
                user_agent: "interop-gateway/0.1".to_string(),
            },
            registry: RegistryConfig {
                unhealthy_failure_rate_threshold: 0.5,
            },
            delivery: DeliveryConfig {
                max_retries: 3,
                retry_backoff_base_seconds: 60,
                retry_backoff_cap_seconds: 3600,
                duplicate_window_hours: 24,
                reconciliation_threshold_hours: 24,
                retry_sweep_interval_seconds: 60,
                reconciliation_sweep_interval_seconds: 300,
                submission_path: "/service-deliveries".to_string(),
            },
            compliance: ComplianceConfig {
                fhir: FhirConfig {
                    enabled: true,
                    strict_mode: false,
                    fhir_version: "R4".to_string(),
                },
                oidc: OidcConfig {
                    enabled: true,
                    strict_mode: false,
                },
                gdpr: GdprConfig {
                    enabled: true,
                    strict_mode: true,
                    max_retention_days: 2555,
                },
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
                metrics_enabled: true,
            },
        }
    }

    #[test]
    fn test_config_validation() {
        let config = test_config();
        assert!(config.validate().is_ok());

        let mut bad = test_config();
        bad.server.port = 0;
        assert!(bad.validate().is_err());

        let mut bad = test_config();
        bad.registry.unhealthy_failure_rate_threshold = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = test_config();
        bad.delivery.retry_backoff_cap_seconds = 10;
        assert!(bad.validate().is_err());
    }
}
