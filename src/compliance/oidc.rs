// Identity-federation (OpenID Connect) validation rules.
//
// Pure functions of the supplied provider configuration: the caller fetches
// the discovery document and userinfo claims; the rules only judge what
// they are handed, so identical inputs always produce identical findings.

use crate::compliance::types::{RuleSetEvaluation, StandardDetail, SubCheck};
use crate::config::OidcConfig;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct OidcPayload {
    pub provider_id: String,
    pub discovery_url: String,
    /// The fetched discovery document; absent when the endpoint was
    /// unreachable
    #[serde(default)]
    pub discovery_document: Option<Value>,
    /// Token endpoint request parameters to validate for the declared
    /// grant type
    #[serde(default)]
    pub token_request: Option<Value>,
    #[serde(default)]
    pub requested_scopes: Vec<String>,
    /// Provider-advertised scopes; falls back to the discovery document's
    /// `scopes_supported` when absent
    #[serde(default)]
    pub supported_scopes: Option<Vec<String>>,
    /// Claims returned by the userinfo endpoint; absent when inaccessible
    #[serde(default)]
    pub userinfo_claims: Option<Value>,
}

const REQUIRED_DISCOVERY_FIELDS: &[&str] = &[
    "issuer",
    "authorization_endpoint",
    "token_endpoint",
    "userinfo_endpoint",
    "jwks_uri",
    "response_types_supported",
    "subject_types_supported",
    "id_token_signing_alg_values_supported",
];

const STANDARD_SCOPES: &[&str] = &["openid", "profile", "email", "address", "phone"];
const STANDARD_CLAIMS: &[&str] = &["sub", "name", "email", "email_verified"];

/// Evaluate the OIDC rule-set against one provider configuration
pub fn evaluate(config: &OidcConfig, payload: &OidcPayload) -> RuleSetEvaluation {
    let mut checks = vec![discovery_check(payload)];

    if payload.token_request.is_some() {
        checks.push(token_check(payload));
    }

    checks.push(scope_check(payload));

    if payload.userinfo_claims.is_some() {
        checks.push(userinfo_check(payload));
    }

    let total_errors: usize = checks.iter().map(|c| c.errors.len()).sum();
    let valid = total_errors == 0 || (!config.strict_mode && total_errors <= 1);

    RuleSetEvaluation {
        subject: payload.provider_id.clone(),
        checks,
        valid,
        detail: StandardDetail::Oidc {
            provider_id: payload.provider_id.clone(),
            discovery_url: payload.discovery_url.clone(),
        },
    }
}

fn discovery_check(payload: &OidcPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let url = payload.discovery_url.trim();
    if url.is_empty() {
        errors.push("Discovery URL cannot be empty".to_string());
        return SubCheck::new("discovery", errors, warnings);
    }

    if !url.starts_with("https://") {
        errors.push("Discovery URL must use HTTPS".to_string());
    }

    if !url.ends_with("/.well-known/openid-configuration") {
        errors.push(
            "Discovery URL must end with /.well-known/openid-configuration".to_string(),
        );
    }

    match payload.discovery_document.as_ref().and_then(Value::as_object) {
        Some(document) => {
            for field in REQUIRED_DISCOVERY_FIELDS {
                if !document.contains_key(*field) {
                    errors.push(format!(
                        "Required field missing in discovery document: {}",
                        field
                    ));
                }
            }

            match document
                .get("response_types_supported")
                .and_then(Value::as_array)
            {
                Some(response_types) => {
                    let supports_code = response_types
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|t| t.split_whitespace().any(|part| part == "code"));
                    if !supports_code {
                        errors.push("Authorization code response type not supported".to_string());
                    }
                }
                None => {
                    // Already reported as a missing field above
                }
            }

            if let Some(endpoint) = document.get("token_endpoint").and_then(Value::as_str) {
                if !endpoint.starts_with("https://") {
                    errors.push("Token endpoint must use HTTPS".to_string());
                }
            }

            if document.get("scopes_supported").is_none() {
                warnings.push("Discovery document does not advertise supported scopes".to_string());
            }
        }
        None => {
            errors.push("Discovery document is not accessible".to_string());
        }
    }

    SubCheck::new("discovery", errors, warnings)
}

fn token_check(payload: &OidcPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(request) = payload.token_request.as_ref().and_then(Value::as_object) else {
        errors.push("Token request parameters must be an object".to_string());
        return SubCheck::new("token", errors, warnings);
    };

    let grant_type = request.get("grant_type").and_then(Value::as_str);
    match grant_type {
        None => {
            errors.push("Token request must include grant_type parameter".to_string());
        }
        Some("authorization_code") => {
            if !request.contains_key("code") {
                errors.push("Authorization code grant requires code parameter".to_string());
            }
            if !request.contains_key("redirect_uri") {
                errors.push("Authorization code grant requires redirect_uri parameter".to_string());
            }
        }
        Some("client_credentials") => {
            if !request.contains_key("client_secret") && !request.contains_key("client_assertion") {
                warnings.push(
                    "Client credentials grant should carry a client secret or assertion"
                        .to_string(),
                );
            }
        }
        Some("refresh_token") => {
            if !request.contains_key("refresh_token") {
                errors.push("Refresh grant requires refresh_token parameter".to_string());
            }
        }
        Some(other) => {
            warnings.push(format!("Non-standard grant type requested: {}", other));
        }
    }

    if !request.contains_key("client_id") {
        warnings.push("Token request should include client_id parameter".to_string());
    }

    SubCheck::new("token", errors, warnings)
}

fn scope_check(payload: &OidcPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !payload.requested_scopes.iter().any(|s| s == "openid") {
        errors.push("OpenID Connect requests must include 'openid' scope".to_string());
    }

    // Requested scopes must be a subset of what the provider advertises
    let advertised: Option<Vec<String>> = payload.supported_scopes.clone().or_else(|| {
        payload
            .discovery_document
            .as_ref()
            .and_then(|d| d.get("scopes_supported"))
            .and_then(Value::as_array)
            .map(|scopes| {
                scopes
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
    });

    if let Some(advertised) = &advertised {
        for scope in &payload.requested_scopes {
            if !advertised.contains(scope) {
                errors.push(format!("Requested scope not supported: {}", scope));
            }
        }
    }

    for scope in &payload.requested_scopes {
        if !STANDARD_SCOPES.contains(&scope.as_str()) {
            warnings.push(format!("Non-standard scope requested: {}", scope));
        }
        if !scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.')
        {
            warnings.push(format!("Scope contains invalid characters: {}", scope));
        }
    }

    SubCheck::new("scopes", errors, warnings)
}

fn userinfo_check(payload: &OidcPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(claims) = payload.userinfo_claims.as_ref().and_then(Value::as_object) else {
        errors.push("Userinfo response is not a JSON object".to_string());
        return SubCheck::new("userinfo", errors, warnings);
    };

    if !claims.contains_key("sub") {
        errors.push("Userinfo response missing required 'sub' claim".to_string());
    }

    let standard_present = STANDARD_CLAIMS
        .iter()
        .filter(|claim| claims.contains_key(**claim))
        .count();
    if standard_present <= 1 {
        warnings.push("Userinfo response contains minimal claims".to_string());
    }

    SubCheck::new("userinfo", errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(strict: bool) -> OidcConfig {
        OidcConfig {
            enabled: true,
            strict_mode: strict,
        }
    }

    fn full_discovery_document() -> Value {
        json!({
            "issuer": "https://idp.example.gov",
            "authorization_endpoint": "https://idp.example.gov/authorize",
            "token_endpoint": "https://idp.example.gov/token",
            "userinfo_endpoint": "https://idp.example.gov/userinfo",
            "jwks_uri": "https://idp.example.gov/jwks",
            "response_types_supported": ["code", "id_token"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["RS256"],
            "scopes_supported": ["openid", "profile", "email"]
        })
    }

    fn valid_payload() -> OidcPayload {
        OidcPayload {
            provider_id: "national-idp".to_string(),
            discovery_url: "https://idp.example.gov/.well-known/openid-configuration".to_string(),
            discovery_document: Some(full_discovery_document()),
            token_request: Some(json!({
                "grant_type": "authorization_code",
                "code": "abc",
                "redirect_uri": "https://registry.example.gov/callback",
                "client_id": "registry"
            })),
            requested_scopes: vec!["openid".to_string(), "profile".to_string()],
            supported_scopes: None,
            userinfo_claims: Some(json!({
                "sub": "user-1",
                "name": "Juan Dela Cruz",
                "email": "juan@example.gov"
            })),
        }
    }

    #[test]
    fn test_fully_valid_provider() {
        let result = evaluate(&config(true), &valid_payload());
        assert!(result.valid);
        assert!(result.checks.iter().all(|c| c.errors.is_empty()));
    }

    #[test]
    fn test_http_discovery_url_is_rejected() {
        let mut payload = valid_payload();
        payload.discovery_url =
            "http://idp.example.gov/.well-known/openid-configuration".to_string();

        let result = evaluate(&config(true), &payload);
        assert!(!result.valid);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("HTTPS")));
    }

    #[test]
    fn test_missing_discovery_fields_are_reported() {
        let mut payload = valid_payload();
        let mut document = full_discovery_document();
        document.as_object_mut().unwrap().remove("jwks_uri");
        document.as_object_mut().unwrap().remove("issuer");
        payload.discovery_document = Some(document);

        let result = evaluate(&config(true), &payload);
        let discovery = &result.checks[0];
        assert!(discovery.errors.iter().any(|e| e.contains("jwks_uri")));
        assert!(discovery.errors.iter().any(|e| e.contains("issuer")));
    }

    #[test]
    fn test_unreachable_discovery_document() {
        let mut payload = valid_payload();
        payload.discovery_document = None;

        let result = evaluate(&config(true), &payload);
        assert!(!result.valid);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("not accessible")));
    }

    #[test]
    fn test_authorization_code_grant_requires_code_and_redirect() {
        let mut payload = valid_payload();
        payload.token_request = Some(json!({"grant_type": "authorization_code"}));

        let result = evaluate(&config(true), &payload);
        let token = result.checks.iter().find(|c| c.name == "token").unwrap();
        assert!(token.errors.iter().any(|e| e.contains("code parameter")));
        assert!(token.errors.iter().any(|e| e.contains("redirect_uri")));
    }

    #[test]
    fn test_openid_scope_is_mandatory() {
        let mut payload = valid_payload();
        payload.requested_scopes = vec!["profile".to_string()];

        let result = evaluate(&config(true), &payload);
        let scopes = result.checks.iter().find(|c| c.name == "scopes").unwrap();
        assert!(scopes
            .errors
            .iter()
            .any(|e| e.contains("'openid' scope")));
    }

    #[test]
    fn test_requested_scopes_must_be_subset_of_advertised() {
        let mut payload = valid_payload();
        payload.requested_scopes = vec!["openid".to_string(), "payroll".to_string()];

        let result = evaluate(&config(true), &payload);
        let scopes = result.checks.iter().find(|c| c.name == "scopes").unwrap();
        assert!(scopes
            .errors
            .iter()
            .any(|e| e.contains("Requested scope not supported: payroll")));
        // And it is flagged as non-standard
        assert!(scopes
            .warnings
            .iter()
            .any(|w| w.contains("Non-standard scope")));
    }

    #[test]
    fn test_explicit_supported_scopes_override_discovery() {
        let mut payload = valid_payload();
        payload.supported_scopes = Some(vec!["openid".to_string()]);
        payload.requested_scopes = vec!["openid".to_string(), "profile".to_string()];

        let result = evaluate(&config(true), &payload);
        let scopes = result.checks.iter().find(|c| c.name == "scopes").unwrap();
        assert!(scopes
            .errors
            .iter()
            .any(|e| e.contains("profile")));
    }

    #[test]
    fn test_userinfo_requires_sub_claim() {
        let mut payload = valid_payload();
        payload.userinfo_claims = Some(json!({"name": "Juan"}));

        let result = evaluate(&config(true), &payload);
        let userinfo = result.checks.iter().find(|c| c.name == "userinfo").unwrap();
        assert!(userinfo.errors.iter().any(|e| e.contains("'sub' claim")));
        assert!(userinfo
            .warnings
            .iter()
            .any(|w| w.contains("minimal claims")));
    }

    #[test]
    fn test_non_strict_tolerates_single_error() {
        let mut payload = valid_payload();
        payload.requested_scopes = vec!["profile".to_string()]; // missing openid only... plus subset ok

        let lenient = evaluate(&config(false), &payload);
        assert!(lenient.valid);

        let strict = evaluate(&config(true), &payload);
        assert!(!strict.valid);
    }

    #[test]
    fn test_missing_code_response_type() {
        let mut payload = valid_payload();
        let mut document = full_discovery_document();
        document["response_types_supported"] = json!(["id_token"]);
        payload.discovery_document = Some(document);

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("Authorization code response type")));
    }
}
