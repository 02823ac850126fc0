// Authentication header injection for outbound calls.
//
// The scheme is configuration on the registry entry, never hard-coded per
// call. Credentials are referenced, not stored: an `env://NAME` reference
// reads the named environment variable (the deployment injects secrets that
// way); any other reference value is treated as the literal secret material
// a secret-store sidecar already resolved into the row.

use crate::db::schema::{AuthScheme, ExternalSystem};
use crate::errors::{GatewayError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

const API_KEY_HEADER: &str = "x-api-key";

/// Resolve the secret behind a credentials reference
fn resolve_credentials(credentials_ref: &str) -> Result<String> {
    if let Some(var) = credentials_ref.strip_prefix("env://") {
        return std::env::var(var).map_err(|_| {
            GatewayError::Configuration(format!(
                "Credentials variable {} is not set",
                var
            ))
        });
    }

    Ok(credentials_ref.to_string())
}

/// Inject authentication headers for the system's configured scheme
pub fn apply_auth(headers: &mut HeaderMap, system: &ExternalSystem) -> Result<()> {
    let scheme = AuthScheme::from_str(&system.auth_type).ok_or_else(|| {
        GatewayError::Configuration(format!(
            "System {} has unknown authentication scheme {}",
            system.system_code, system.auth_type
        ))
    })?;

    // mTLS is configured on the HTTP client itself, not per request
    if matches!(scheme, AuthScheme::None | AuthScheme::MutualTls) {
        return Ok(());
    }

    let credentials_ref = system.credentials_ref.as_deref().ok_or_else(|| {
        GatewayError::Configuration(format!(
            "System {} requires credentials for scheme {}",
            system.system_code, system.auth_type
        ))
    })?;
    let secret = resolve_credentials(credentials_ref)?;

    let (name, value) = match scheme {
        AuthScheme::ApiKey => (
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(&secret),
        ),
        AuthScheme::Bearer | AuthScheme::OAuth2ClientCredentials => (
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", secret)),
        ),
        AuthScheme::Basic => (
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", BASE64.encode(secret.as_bytes()))),
        ),
        AuthScheme::None | AuthScheme::MutualTls => unreachable!(),
    };

    let mut value = value.map_err(|e| {
        GatewayError::Configuration(format!("Invalid credential material: {}", e))
    })?;
    value.set_sensitive(true);
    headers.insert(name, value);

    Ok(())
}
