use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A request routed through the gateway to a registered external system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub system_code: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Overrides the registered system timeout for this call
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Whether a retryable failure should be scheduled for retry by the
    /// delivery tracker. The gateway client itself never retries.
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl GatewayRequest {
    pub fn new(system_code: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            system_code: system_code.into(),
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
            timeout_seconds: None,
            retry_on_failure: true,
            correlation_id: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Correlation ID, generating one when the caller did not supply it
    pub fn correlation_id_or_new(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Classification of a failed gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Connect failure or timeout before a response arrived
    Network,
    /// HTTP 5xx from the partner system
    Server,
    /// HTTP 4xx other than 429; will not succeed by repetition
    Client,
    /// HTTP 429, or a local window exhausted before dispatch
    RateLimited,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Client)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorClass::Network => "NETWORK_ERROR",
            ErrorClass::Server => "SERVER_ERROR",
            ErrorClass::Client => "CLIENT_ERROR",
            ErrorClass::RateLimited => "RATE_LIMITED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NETWORK_ERROR" => Some(ErrorClass::Network),
            "SERVER_ERROR" => Some(ErrorClass::Server),
            "CLIENT_ERROR" => Some(ErrorClass::Client),
            "RATE_LIMITED" => Some(ErrorClass::RateLimited),
            _ => None,
        }
    }
}

/// Classify an HTTP status code. `None` means the call succeeded.
pub fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        429 => Some(ErrorClass::RateLimited),
        s if s >= 500 => Some(ErrorClass::Server),
        s if s >= 400 => Some(ErrorClass::Client),
        _ => None,
    }
}

/// Uniform response envelope. Callers branch on `success` and `error_code`,
/// never on transport-level exception types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub status_code: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub response_time_ms: u64,
    pub system_code: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl GatewayResponse {
    /// Failure classification parsed back from the envelope
    pub fn failure_class(&self) -> Option<ErrorClass> {
        if self.success {
            return None;
        }
        self.error_code.as_deref().and_then(ErrorClass::from_code)
    }

    /// Whether the recorded failure is worth a retry
    pub fn is_retryable_failure(&self) -> bool {
        self.failure_class()
            .map(|class| class.is_retryable())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(201), None);
        assert_eq!(classify_status(304), None);

        assert_eq!(classify_status(400), Some(ErrorClass::Client));
        assert_eq!(classify_status(404), Some(ErrorClass::Client));
        assert_eq!(classify_status(422), Some(ErrorClass::Client));
        assert_eq!(classify_status(429), Some(ErrorClass::RateLimited));
        assert_eq!(classify_status(500), Some(ErrorClass::Server));
        assert_eq!(classify_status(503), Some(ErrorClass::Server));
    }

    #[test]
    fn test_retryability_per_class() {
        assert!(ErrorClass::Network.is_retryable());
        assert!(ErrorClass::Server.is_retryable());
        assert!(ErrorClass::RateLimited.is_retryable());
        assert!(!ErrorClass::Client.is_retryable());
    }

    #[test]
    fn test_envelope_failure_class_round_trip() {
        let response = GatewayResponse {
            success: false,
            status_code: Some(503),
            headers: HashMap::new(),
            body: None,
            error_code: Some("SERVER_ERROR".to_string()),
            error_message: Some("upstream unavailable".to_string()),
            response_time_ms: 12,
            system_code: "SSS".to_string(),
            correlation_id: "abc".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(response.failure_class(), Some(ErrorClass::Server));
        assert!(response.is_retryable_failure());
    }

    #[test]
    fn test_successful_envelope_has_no_failure_class() {
        let response = GatewayResponse {
            success: true,
            status_code: Some(200),
            headers: HashMap::new(),
            body: None,
            error_code: None,
            error_message: None,
            response_time_ms: 5,
            system_code: "SSS".to_string(),
            correlation_id: "abc".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(response.failure_class(), None);
        assert!(!response.is_retryable_failure());
    }
}
