use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub enum GatewayError {
    // Database errors
    Database(sqlx::Error),
    DatabaseMigration(sqlx::migrate::MigrateError),

    // Redis errors
    Redis(redis::RedisError),

    // Registry errors
    SystemNotFound(String),
    SystemDisabled(String),
    SystemAlreadyExists(String),

    // Gateway transport errors (classified per call outcome)
    NetworkError(String),
    ServerError(u16, String),
    ClientError(u16, String),
    RateLimited(String),

    // Delivery tracking errors
    RecordNotFound(String),
    DuplicateDelivery(String),
    MaxRetriesExceeded(String),
    InvalidTransition(String),

    // Validation errors
    ValidationError(String),

    // Configuration errors
    Configuration(String),

    // Internal errors
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Database(e) => write!(f, "Database error: {}", e),
            GatewayError::DatabaseMigration(e) => write!(f, "Database migration error: {}", e),
            GatewayError::Redis(e) => write!(f, "Redis error: {}", e),
            GatewayError::SystemNotFound(code) => write!(f, "External system not found: {}", code),
            GatewayError::SystemDisabled(code) => write!(f, "External system is disabled: {}", code),
            GatewayError::SystemAlreadyExists(code) => {
                write!(f, "External system already registered: {}", code)
            }
            GatewayError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            GatewayError::ServerError(status, msg) => {
                write!(f, "Upstream server error ({}): {}", status, msg)
            }
            GatewayError::ClientError(status, msg) => {
                write!(f, "Upstream client error ({}): {}", status, msg)
            }
            GatewayError::RateLimited(msg) => write!(f, "Rate limit exceeded: {}", msg),
            GatewayError::RecordNotFound(id) => write!(f, "Delivery record not found: {}", id),
            GatewayError::DuplicateDelivery(id) => {
                write!(f, "Duplicate delivery detected, original transaction: {}", id)
            }
            GatewayError::MaxRetriesExceeded(id) => {
                write!(f, "Delivery exhausted retries: {}", id)
            }
            GatewayError::InvalidTransition(msg) => write!(f, "Invalid state transition: {}", msg),
            GatewayError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            GatewayError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            GatewayError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// Whether the failure class is worth retrying through the sweep.
    /// Client errors (4xx other than 429) never succeed by repetition;
    /// registry configuration problems require operator action first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::NetworkError(_)
                | GatewayError::ServerError(_, _)
                | GatewayError::RateLimited(_)
        )
    }

    /// Short machine-readable code used in gateway response envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Database(_) | GatewayError::DatabaseMigration(_) => "DATABASE_ERROR",
            GatewayError::Redis(_) => "REDIS_ERROR",
            GatewayError::SystemNotFound(_) => "SYSTEM_NOT_FOUND",
            GatewayError::SystemDisabled(_) => "SYSTEM_DISABLED",
            GatewayError::SystemAlreadyExists(_) => "SYSTEM_ALREADY_EXISTS",
            GatewayError::NetworkError(_) => "NETWORK_ERROR",
            GatewayError::ServerError(_, _) => "SERVER_ERROR",
            GatewayError::ClientError(_, _) => "CLIENT_ERROR",
            GatewayError::RateLimited(_) => "RATE_LIMITED",
            GatewayError::RecordNotFound(_) => "RECORD_NOT_FOUND",
            GatewayError::DuplicateDelivery(_) => "DUPLICATE_DELIVERY",
            GatewayError::MaxRetriesExceeded(_) => "MAX_RETRIES_EXCEEDED",
            GatewayError::InvalidTransition(_) => "INVALID_TRANSITION",
            GatewayError::ValidationError(_) => "VALIDATION_ERROR",
            GatewayError::Configuration(_) => "CONFIGURATION_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// Convert from various error types
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::Database(err)
    }
}

impl From<sqlx::migrate::MigrateError> for GatewayError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        GatewayError::DatabaseMigration(err)
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        GatewayError::Redis(err)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::NetworkError(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            GatewayError::NetworkError(format!("Connection failed: {}", err))
        } else {
            GatewayError::NetworkError(err.to_string())
        }
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            GatewayError::Database(_) | GatewayError::DatabaseMigration(_) => {
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            GatewayError::Redis(_) => {
                tracing::error!("Redis error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            GatewayError::SystemNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            GatewayError::SystemDisabled(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            GatewayError::SystemAlreadyExists(_) => (StatusCode::CONFLICT, self.to_string()),
            GatewayError::NetworkError(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            GatewayError::ServerError(_, _) => (StatusCode::BAD_GATEWAY, self.to_string()),
            GatewayError::ClientError(_, _) => (StatusCode::BAD_REQUEST, self.to_string()),
            GatewayError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            GatewayError::RecordNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            GatewayError::DuplicateDelivery(_) => (StatusCode::CONFLICT, self.to_string()),
            GatewayError::MaxRetriesExceeded(_) => (StatusCode::CONFLICT, self.to_string()),
            GatewayError::InvalidTransition(_) => (StatusCode::CONFLICT, self.to_string()),
            GatewayError::ValidationError(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            GatewayError::Configuration(_) => {
                tracing::error!("Configuration error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            GatewayError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": self.error_code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::NetworkError("timeout".into()).is_retryable());
        assert!(GatewayError::ServerError(503, "unavailable".into()).is_retryable());
        assert!(GatewayError::RateLimited("minute window".into()).is_retryable());

        assert!(!GatewayError::ClientError(400, "bad request".into()).is_retryable());
        assert!(!GatewayError::SystemNotFound("PHILSYS".into()).is_retryable());
        assert!(!GatewayError::SystemDisabled("SSS".into()).is_retryable());
        assert!(!GatewayError::ValidationError("missing field".into()).is_retryable());
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            GatewayError::NetworkError("x".into()).error_code(),
            "NETWORK_ERROR"
        );
        assert_eq!(
            GatewayError::ClientError(404, "x".into()).error_code(),
            "CLIENT_ERROR"
        );
        assert_eq!(
            GatewayError::RateLimited("x".into()).error_code(),
            "RATE_LIMITED"
        );
    }
}
