use crate::compliance::sink::ComplianceSink;
use crate::compliance::types::{
    aggregate_score, derive_level, NewComplianceRecord, RuleSetEvaluation, Standard,
    StandardPayload, SubCheck, ValidationOutcome,
};
use crate::compliance::{fhir, gdpr, oidc};
use crate::config::ComplianceConfig;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

const CHECKED_BY: &str = "COMPLIANCE_ENGINE";

/// Dispatches compliance checks to the per-standard rule-sets and appends
/// one immutable audit record per invocation, whatever the outcome.
///
/// The rule-sets are pure: identical payload and configuration always
/// produce the identical error/warning lists and score. Only the
/// `validated_at` stamp and duration vary between runs.
pub struct ComplianceEngine {
    config: ComplianceConfig,
    sink: Arc<dyn ComplianceSink>,
}

impl ComplianceEngine {
    pub fn new(config: ComplianceConfig, sink: Arc<dyn ComplianceSink>) -> Self {
        Self { config, sink }
    }

    pub async fn validate(&self, payload: StandardPayload) -> Result<ValidationOutcome> {
        let standard = payload.standard();
        let started = Instant::now();

        tracing::info!(standard = %standard.as_str(), "Running compliance validation");

        let evaluation = self.evaluate(&payload);
        let outcome = build_outcome(standard, evaluation, started.elapsed().as_millis() as u64);

        self.sink.append(record_from(&outcome, standard)).await?;
        MetricsRecorder::record_compliance_check(standard.as_str(), outcome.valid);

        tracing::info!(
            standard = %standard.as_str(),
            subject = %outcome.subject,
            valid = %outcome.valid,
            score = %outcome.score,
            level = %outcome.level,
            "Compliance validation completed"
        );

        Ok(outcome)
    }

    fn evaluate(&self, payload: &StandardPayload) -> RuleSetEvaluation {
        match payload {
            StandardPayload::Fhir(p) => {
                if !self.config.fhir.enabled {
                    return disabled(Standard::Fhir, p.resource_type.clone(), self, payload);
                }
                fhir::evaluate(&self.config.fhir, p)
            }
            StandardPayload::Oidc(p) => {
                if !self.config.oidc.enabled {
                    return disabled(Standard::Oidc, p.provider_id.clone(), self, payload);
                }
                oidc::evaluate(&self.config.oidc, p)
            }
            StandardPayload::Gdpr(p) => {
                if !self.config.gdpr.enabled {
                    return disabled(Standard::Gdpr, p.processing_purpose.clone(), self, payload);
                }
                gdpr::evaluate(&self.config.gdpr, p)
            }
        }
    }
}

/// A disabled standard still produces a (failed) outcome and audit record;
/// compliance history records the refusal rather than silently passing.
fn disabled(
    standard: Standard,
    subject: String,
    engine: &ComplianceEngine,
    payload: &StandardPayload,
) -> RuleSetEvaluation {
    let detail = match payload {
        StandardPayload::Fhir(p) => crate::compliance::types::StandardDetail::Fhir {
            resource_type: p.resource_type.clone(),
            fhir_version: engine.config.fhir.fhir_version.clone(),
            profiles: p.profiles.clone(),
        },
        StandardPayload::Oidc(p) => crate::compliance::types::StandardDetail::Oidc {
            provider_id: p.provider_id.clone(),
            discovery_url: p.discovery_url.clone(),
        },
        StandardPayload::Gdpr(p) => {
            let derived = gdpr::derive_exposure(p);
            crate::compliance::types::StandardDetail::Gdpr {
                lawful_basis: p.lawful_basis.clone(),
                data_categories: p.data_categories.clone(),
                risk_level: derived.risk_level,
                dpia_required: derived.dpia_required,
                dpo_consultation_required: derived.dpo_consultation_required,
                supervisory_notification_required: derived.supervisory_notification_required,
            }
        }
    };

    RuleSetEvaluation {
        subject,
        checks: vec![SubCheck::new(
            "enabled",
            vec![format!("{} validation is disabled", standard.as_str())],
            vec![],
        )],
        valid: false,
        detail,
    }
}

fn build_outcome(
    standard: Standard,
    evaluation: RuleSetEvaluation,
    duration_ms: u64,
) -> ValidationOutcome {
    let errors: Vec<String> = evaluation
        .checks
        .iter()
        .flat_map(|c| c.errors.iter().cloned())
        .collect();
    let warnings: Vec<String> = evaluation
        .checks
        .iter()
        .flat_map(|c| c.warnings.iter().cloned())
        .collect();

    let score = aggregate_score(&evaluation.checks);
    let level = derive_level(evaluation.valid, &errors, &warnings);

    ValidationOutcome {
        standard: standard.as_str().to_string(),
        subject: evaluation.subject,
        valid: evaluation.valid,
        errors,
        warnings,
        score,
        level: level.as_str().to_string(),
        checks: evaluation.checks,
        detail: evaluation.detail,
        validated_at: Utc::now(),
        duration_ms,
    }
}

fn record_from(outcome: &ValidationOutcome, standard: Standard) -> NewComplianceRecord {
    let severity = if outcome.valid {
        "LOW"
    } else if standard == Standard::Gdpr {
        "HIGH"
    } else {
        "MEDIUM"
    };

    NewComplianceRecord {
        standard: standard.as_str().to_string(),
        subject: outcome.subject.clone(),
        compliant: outcome.valid,
        score: outcome.score,
        level: outcome.level.clone(),
        category: format!("{}_VALIDATION", standard.as_str()),
        severity: severity.to_string(),
        details: format!(
            "Errors: {}, Warnings: {}",
            outcome.errors.len(),
            outcome.warnings.len()
        ),
        checked_by: CHECKED_BY.to_string(),
        checked_at: outcome.validated_at,
        expires_at: standard.expiry_from(outcome.validated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComplianceConfig, FhirConfig, GdprConfig, OidcConfig};
    use crate::db::schema::ComplianceRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Collects appended records so engine tests run without Postgres
    struct InMemorySink {
        records: Mutex<Vec<ComplianceRecord>>,
    }

    impl InMemorySink {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
            }
        }

        fn appended(&self) -> Vec<ComplianceRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ComplianceSink for InMemorySink {
        async fn append(&self, record: NewComplianceRecord) -> crate::errors::Result<ComplianceRecord> {
            let stored = ComplianceRecord {
                id: Uuid::new_v4(),
                standard: record.standard,
                subject: record.subject,
                compliant: record.compliant,
                score: record.score,
                level: record.level,
                category: record.category,
                severity: record.severity,
                details: record.details,
                checked_by: record.checked_by,
                checked_at: record.checked_at,
                expires_at: record.expires_at,
            };
            self.records.lock().unwrap().push(stored.clone());
            Ok(stored)
        }
    }

    fn engine_config() -> ComplianceConfig {
        ComplianceConfig {
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
        }
    }

    fn engine_with_sink() -> (ComplianceEngine, Arc<InMemorySink>) {
        let sink = Arc::new(InMemorySink::new());
        (ComplianceEngine::new(engine_config(), sink.clone()), sink)
    }

    fn fhir_payload() -> StandardPayload {
        StandardPayload::Fhir(crate::compliance::fhir::FhirPayload {
            resource_type: "Patient".to_string(),
            resource: json!({
                "resourceType": "Patient",
                "identifier": [{"system": "http://hl7.org/fhir/sid/icd-10", "value": "PSN-1"}],
                "name": [{"family": "Reyes"}],
                "gender": "female"
            }),
            profiles: vec![],
            validate_terminology: true,
        })
    }

    fn gdpr_payload(special_category: bool) -> StandardPayload {
        StandardPayload::Gdpr(crate::compliance::gdpr::GdprPayload {
            processing_purpose: "benefit eligibility assessment".to_string(),
            lawful_basis: Some("PUBLIC_TASK".to_string()),
            data_categories: vec!["identity".to_string()],
            special_category_data: special_category,
            large_scale_processing: false,
            international_transfers: false,
            adequacy_decision: false,
            transfer_safeguards: false,
            subject_rights: Some(json!({
                "rightToAccess": {"implemented": true, "responseTimeLimitDays": 15},
                "rightToRectification": {"implemented": true},
                "rightToErasure": {"implemented": true},
                "rightToRestrictProcessing": {"implemented": true},
                "rightToDataPortability": {"implemented": true},
                "rightToObject": {"implemented": true}
            })),
            retention_policy: Some(json!({
                "retentionPeriods": {"profiles": 1825},
                "automaticDeletionEnabled": true,
                "retentionJustification": "statutory"
            })),
            dpia_completed: false,
        })
    }

    #[tokio::test]
    async fn test_every_invocation_appends_exactly_one_record() {
        let (engine, sink) = engine_with_sink();

        engine.validate(fhir_payload()).await.unwrap();
        assert_eq!(sink.appended().len(), 1);

        engine.validate(gdpr_payload(false)).await.unwrap();
        assert_eq!(sink.appended().len(), 2);

        // Failed validations are recorded too
        let broken = StandardPayload::Fhir(crate::compliance::fhir::FhirPayload {
            resource_type: "Patient".to_string(),
            resource: json!({}),
            profiles: vec![],
            validate_terminology: false,
        });
        engine.validate(broken).await.unwrap();
        assert_eq!(sink.appended().len(), 3);
    }

    #[tokio::test]
    async fn test_determinism_for_identical_inputs() {
        let (engine, _sink) = engine_with_sink();

        let first = engine.validate(gdpr_payload(true)).await.unwrap();
        let second = engine.validate(gdpr_payload(true)).await.unwrap();

        assert_eq!(first.errors, second.errors);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.score, second.score);
        assert_eq!(first.level, second.level);
        assert_eq!(first.valid, second.valid);
    }

    #[tokio::test]
    async fn test_fully_compliant_scores_hundred() {
        let (engine, sink) = engine_with_sink();

        let outcome = engine.validate(fhir_payload()).await.unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.level, "FULLY_COMPLIANT");

        let record = &sink.appended()[0];
        assert!(record.compliant);
        assert_eq!(record.severity, "LOW");
        assert_eq!(record.category, "FHIR_VALIDATION");
        assert!(record.expires_at > record.checked_at);
    }

    #[tokio::test]
    async fn test_gdpr_special_category_scenario() {
        let (engine, _sink) = engine_with_sink();

        // Otherwise compliant declaration carrying special-category data
        // with no completed DPIA
        let outcome = engine.validate(gdpr_payload(true)).await.unwrap();

        let crate::compliance::types::StandardDetail::Gdpr {
            risk_level,
            dpia_required,
            dpo_consultation_required,
            ..
        } = outcome.detail
        else {
            panic!("expected GDPR detail");
        };

        assert_eq!(risk_level, crate::compliance::types::RiskLevel::High);
        assert!(dpia_required);
        assert!(dpo_consultation_required);
    }

    #[tokio::test]
    async fn test_warnings_only_is_mostly_compliant() {
        let (engine, _sink) = engine_with_sink();

        // Legitimate interests draws a warning but no error
        let payload = StandardPayload::Gdpr(match gdpr_payload(false) {
            StandardPayload::Gdpr(mut p) => {
                p.lawful_basis = Some("LEGITIMATE_INTERESTS".to_string());
                p
            }
            _ => unreachable!(),
        });

        let outcome = engine.validate(payload).await.unwrap();
        assert!(outcome.valid);
        assert!(outcome.errors.is_empty());
        assert!(!outcome.warnings.is_empty());
        assert_eq!(outcome.level, "MOSTLY_COMPLIANT");
    }

    #[tokio::test]
    async fn test_errors_with_tolerated_validity_cap_level() {
        let (engine, _sink) = engine_with_sink();

        // One structural error, tolerated by non-strict FHIR: valid overall
        // but capped at PARTIALLY_COMPLIANT
        let payload = StandardPayload::Fhir(crate::compliance::fhir::FhirPayload {
            resource_type: "Medication".to_string(),
            resource: json!({"resourceType": "Medication"}),
            profiles: vec![],
            validate_terminology: false,
        });

        let outcome = engine.validate(payload).await.unwrap();
        assert!(outcome.valid);
        assert!(!outcome.errors.is_empty());
        assert_eq!(outcome.level, "PARTIALLY_COMPLIANT");
        assert!(outcome.score < 100.0);
    }

    #[tokio::test]
    async fn test_disabled_standard_is_recorded_as_non_compliant() {
        let mut config = engine_config();
        config.oidc.enabled = false;
        let sink = Arc::new(InMemorySink::new());
        let engine = ComplianceEngine::new(config, sink.clone());

        let payload = StandardPayload::Oidc(crate::compliance::oidc::OidcPayload {
            provider_id: "idp".to_string(),
            discovery_url: "https://idp.example.gov/.well-known/openid-configuration".to_string(),
            discovery_document: None,
            token_request: None,
            requested_scopes: vec!["openid".to_string()],
            supported_scopes: None,
            userinfo_claims: None,
        });

        let outcome = engine.validate(payload).await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.level, "NON_COMPLIANT");
        assert_eq!(outcome.score, 0.0);

        let records = sink.appended();
        assert_eq!(records.len(), 1);
        assert!(!records[0].compliant);
    }

    #[tokio::test]
    async fn test_gdpr_record_severity_is_high_on_failure() {
        let (engine, sink) = engine_with_sink();

        let payload = StandardPayload::Gdpr(match gdpr_payload(false) {
            StandardPayload::Gdpr(mut p) => {
                p.lawful_basis = None;
                p.retention_policy = None;
                p
            }
            _ => unreachable!(),
        });

        let outcome = engine.validate(payload).await.unwrap();
        assert!(!outcome.valid);

        let record = &sink.appended()[0];
        assert_eq!(record.severity, "HIGH");
        assert_eq!(record.level, "NON_COMPLIANT");
    }
}
