use crate::compliance::{fhir::FhirPayload, gdpr::GdprPayload, oidc::OidcPayload};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Standards
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Standard {
    Fhir,
    Oidc,
    Gdpr,
}

impl Standard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Fhir => "FHIR",
            Standard::Oidc => "OIDC",
            Standard::Gdpr => "GDPR",
        }
    }

    /// Re-validation interval mandated per standard
    pub fn expiry_from(&self, checked_at: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Standard::Fhir => 6,
            Standard::Oidc => 3,
            Standard::Gdpr => 12,
        };
        checked_at
            .checked_add_months(Months::new(months))
            .unwrap_or(checked_at + Duration::days(30 * months as i64))
    }
}

/// Inbound compliance-check request, dispatched by tag. Replaces the
/// runtime standard-name switching of older designs with a sum type.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "standard")]
pub enum StandardPayload {
    #[serde(rename = "FHIR")]
    Fhir(FhirPayload),
    #[serde(rename = "OIDC")]
    Oidc(OidcPayload),
    #[serde(rename = "GDPR")]
    Gdpr(GdprPayload),
}

impl StandardPayload {
    pub fn standard(&self) -> Standard {
        match self {
            StandardPayload::Fhir(_) => Standard::Fhir,
            StandardPayload::Oidc(_) => Standard::Oidc,
            StandardPayload::Gdpr(_) => Standard::Gdpr,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Four-point ordinal compliance classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplianceLevel {
    NonCompliant,
    PartiallyCompliant,
    MostlyCompliant,
    FullyCompliant,
}

impl ComplianceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceLevel::NonCompliant => "NON_COMPLIANT",
            ComplianceLevel::PartiallyCompliant => "PARTIALLY_COMPLIANT",
            ComplianceLevel::MostlyCompliant => "MOSTLY_COMPLIANT",
            ComplianceLevel::FullyCompliant => "FULLY_COMPLIANT",
        }
    }
}

/// Level thresholds: failed validity floors the result; errors cap it at
/// PARTIALLY_COMPLIANT; warnings alone allow MOSTLY_COMPLIANT.
pub fn derive_level(valid: bool, errors: &[String], warnings: &[String]) -> ComplianceLevel {
    if !valid {
        ComplianceLevel::NonCompliant
    } else if !errors.is_empty() {
        ComplianceLevel::PartiallyCompliant
    } else if !warnings.is_empty() {
        ComplianceLevel::MostlyCompliant
    } else {
        ComplianceLevel::FullyCompliant
    }
}

/// One named sub-check within a rule-set evaluation
#[derive(Debug, Clone, Serialize)]
pub struct SubCheck {
    pub name: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub score: f64,
}

impl SubCheck {
    /// Default scoring: 100 when valid, 0 when invalid
    pub fn new(name: &str, errors: Vec<String>, warnings: Vec<String>) -> Self {
        let valid = errors.is_empty();
        Self {
            name: name.to_string(),
            valid,
            errors,
            warnings,
            score: if valid { 100.0 } else { 0.0 },
        }
    }
}

/// Aggregate score over sub-checks: arithmetic mean
pub fn aggregate_score(checks: &[SubCheck]) -> f64 {
    if checks.is_empty() {
        return 0.0;
    }
    checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64
}

/// Output of one rule-set run, before the engine stamps timing and level
#[derive(Debug, Clone)]
pub struct RuleSetEvaluation {
    pub subject: String,
    pub checks: Vec<SubCheck>,
    pub valid: bool,
    pub detail: StandardDetail,
}

/// Standard-specific payload carried on the outcome
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StandardDetail {
    Fhir {
        resource_type: String,
        fhir_version: String,
        profiles: Vec<String>,
    },
    Oidc {
        provider_id: String,
        discovery_url: String,
    },
    Gdpr {
        lawful_basis: Option<String>,
        data_categories: Vec<String>,
        risk_level: RiskLevel,
        dpia_required: bool,
        dpo_consultation_required: bool,
        supervisory_notification_required: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Full validation outcome returned to the caller. Summarized into an
/// immutable ComplianceRecord by the engine; not itself persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub standard: String,
    pub subject: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub score: f64,
    pub level: String,
    pub checks: Vec<SubCheck>,
    pub detail: StandardDetail,
    pub validated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Insert payload for the append-only compliance audit table
#[derive(Debug, Clone)]
pub struct NewComplianceRecord {
    pub standard: String,
    pub subject: String,
    pub compliant: bool,
    pub score: f64,
    pub level: String,
    pub category: String,
    pub severity: String,
    pub details: String,
    pub checked_by: String,
    pub checked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
