use crate::config::GatewayConfig;
use crate::db::schema::ExternalSystem;
use crate::errors::{GatewayError, Result};
use crate::gateway::auth::apply_auth;
use crate::gateway::types::{classify_status, ErrorClass, GatewayRequest, GatewayResponse};
use crate::observability::MetricsRecorder;
use crate::rate_limit::RateLimiter;
use crate::registry::SystemDirectory;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Routes authenticated, rate-limited, timeout-bounded calls to registered
/// external systems and normalizes every outcome into a uniform envelope.
///
/// The client never retries: retry policy belongs to the delivery tracker,
/// which owns the durable record of what must eventually happen.
pub struct GatewayClient {
    http: reqwest::Client,
    directory: Arc<dyn SystemDirectory>,
    limiter: Option<Arc<RateLimiter>>,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(directory: Arc<dyn SystemDirectory>, config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            directory,
            limiter: None,
            config,
        })
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Execute a call against the target system.
    ///
    /// Configuration-level failures (unknown system, disabled system,
    /// exhausted local rate window) surface as errors before anything is
    /// dispatched and do not touch the call counters. Once a call is
    /// dispatched the outcome always comes back as an `Ok` envelope and is
    /// recorded against the registry exactly once.
    pub async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        let system = self.directory.resolve(&request.system_code).await?;

        if let Some(limiter) = &self.limiter {
            limiter.check_system(&system).await?;
        }

        let correlation_id = request.correlation_id_or_new();
        let timeout = self.call_timeout(&system, &request);
        let url = join_url(&system.base_url, &request.path);

        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| {
                GatewayError::ValidationError(format!("Invalid HTTP method: {}", request.method))
            })?;

        let mut headers = build_headers(&request.headers)?;
        apply_auth(&mut headers, &system)?;

        tracing::debug!(
            system = %system.system_code,
            method = %method,
            url = %url,
            correlation_id = %correlation_id,
            timeout_seconds = %timeout.as_secs(),
            "Dispatching gateway call"
        );

        let mut builder = self
            .http
            .request(method, &url)
            .headers(headers)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let outcome = builder.send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let envelope = match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                let response_headers = collect_headers(response.headers());
                let body = read_body(response).await;
                let class = classify_status(status);

                GatewayResponse {
                    success: class.is_none(),
                    status_code: Some(status),
                    headers: response_headers,
                    body,
                    error_code: class.map(|c| c.code().to_string()),
                    error_message: class.map(|c| match c {
                        ErrorClass::RateLimited => {
                            format!("System {} rejected the call with 429", system.system_code)
                        }
                        _ => format!("System {} returned HTTP {}", system.system_code, status),
                    }),
                    response_time_ms: elapsed_ms,
                    system_code: system.system_code.clone(),
                    correlation_id,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Call to {} timed out after {:?}", system.system_code, timeout)
                } else {
                    format!("Call to {} failed: {}", system.system_code, e)
                };
                tracing::warn!(system = %system.system_code, error = %e, "Gateway call failed at transport level");

                GatewayResponse {
                    success: false,
                    status_code: None,
                    headers: HashMap::new(),
                    body: None,
                    error_code: Some(ErrorClass::Network.code().to_string()),
                    error_message: Some(message),
                    response_time_ms: elapsed_ms,
                    system_code: system.system_code.clone(),
                    correlation_id,
                    timestamp: Utc::now(),
                }
            }
        };

        // Exactly one counter update per dispatched call, success or failure
        self.directory
            .record_call_outcome(&system.system_code, envelope.success, elapsed_ms as f64)
            .await?;

        MetricsRecorder::record_gateway_call(
            &system.system_code,
            envelope.error_code.as_deref().unwrap_or("OK"),
            elapsed_ms as f64 / 1000.0,
        );

        if envelope.success {
            tracing::info!(
                system = %system.system_code,
                status = ?envelope.status_code,
                response_time_ms = %elapsed_ms,
                "Gateway call completed"
            );
        }

        Ok(envelope)
    }

    /// Probe the system's health endpoint. Does not touch the call
    /// counters; health state transitions go through the registry's
    /// `mark_health_checked`.
    pub async fn probe_health(&self, system: &ExternalSystem) -> HealthProbe {
        let url = join_url(&system.base_url, "/health");
        let timeout = Duration::from_secs(self.config.default_timeout_seconds.min(10));

        let started = Instant::now();
        let outcome = self.http.get(&url).timeout(timeout).send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                HealthProbe {
                    healthy: response.status().is_success(),
                    status_code: Some(status),
                    response_time_ms: elapsed_ms,
                    error: None,
                }
            }
            Err(e) => HealthProbe {
                healthy: false,
                status_code: None,
                response_time_ms: elapsed_ms,
                error: Some(e.to_string()),
            },
        }
    }

    fn call_timeout(&self, system: &ExternalSystem, request: &GatewayRequest) -> Duration {
        let seconds = request
            .timeout_seconds
            .filter(|s| *s > 0)
            .or_else(|| u64::try_from(system.timeout_seconds).ok().filter(|s| *s > 0))
            .unwrap_or(self.config.default_timeout_seconds);
        Duration::from_secs(seconds)
    }
}

/// Result of a health endpoint probe
#[derive(Debug, Clone, Serialize)]
pub struct HealthProbe {
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

fn join_url(base_url: &str, path: &str) -> String {
    match (base_url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &path[1..]),
        (false, false) => format!("{}/{}", base_url, path),
        _ => format!("{}{}", base_url, path),
    }
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::ValidationError(format!("Invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            GatewayError::ValidationError(format!("Invalid header value for {}", name))
        })?;
        map.insert(name, value);
    }

    Ok(map)
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn read_body(response: reqwest::Response) -> Option<serde_json::Value> {
    let bytes = response.bytes().await.ok()?;
    if bytes.is_empty() {
        return None;
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
    }
}
