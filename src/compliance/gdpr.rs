// Data-protection (GDPR) validation rules.
//
// Validates the declared processing configuration: lawful basis, data
// subject rights implementation, retention policy, and transfer safeguards.
// Derives the risk level and whether a formal impact assessment, DPO
// consultation, or supervisory-authority notification is warranted.

use crate::compliance::types::{RiskLevel, RuleSetEvaluation, StandardDetail, SubCheck};
use crate::config::GdprConfig;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct GdprPayload {
    pub processing_purpose: String,
    #[serde(default)]
    pub lawful_basis: Option<String>,
    #[serde(default)]
    pub data_categories: Vec<String>,
    /// Explicit special-category flag; the category list is also scanned
    #[serde(default)]
    pub special_category_data: bool,
    #[serde(default)]
    pub large_scale_processing: bool,
    #[serde(default)]
    pub international_transfers: bool,
    #[serde(default)]
    pub adequacy_decision: bool,
    #[serde(default)]
    pub transfer_safeguards: bool,
    /// Per-right implementation map, e.g. {"rightToAccess": {"implemented": true}}
    #[serde(default)]
    pub subject_rights: Option<Value>,
    #[serde(default)]
    pub retention_policy: Option<Value>,
    #[serde(default)]
    pub dpia_completed: bool,
}

const LAWFUL_BASES: &[&str] = &[
    "CONSENT",
    "CONTRACT",
    "LEGAL_OBLIGATION",
    "VITAL_INTERESTS",
    "PUBLIC_TASK",
    "LEGITIMATE_INTERESTS",
];

const SPECIAL_CATEGORIES: &[&str] = &[
    "health", "biometric", "genetic", "racial", "ethnic", "political", "religious", "sexual",
    "criminal",
];

/// Rights whose absence is an error rather than an advisory
const MANDATORY_RIGHTS: &[&str] = &[
    "rightToAccess",
    "rightToRectification",
    "rightToErasure",
    "rightToRestrictProcessing",
];

const ADVISORY_RIGHTS: &[&str] = &["rightToDataPortability", "rightToObject"];

/// Derived exposure flags, computed once and carried on the outcome
#[derive(Debug, Clone)]
pub struct GdprDerived {
    pub special_category: bool,
    pub risk_level: RiskLevel,
    pub dpia_required: bool,
    pub dpo_consultation_required: bool,
    pub supervisory_notification_required: bool,
}

pub fn derive_exposure(payload: &GdprPayload) -> GdprDerived {
    let special_category = payload.special_category_data
        || payload.data_categories.iter().any(|category| {
            let category = category.to_lowercase();
            SPECIAL_CATEGORIES.iter().any(|s| category.contains(s))
        });

    let unguarded_transfers = payload.international_transfers
        && !payload.adequacy_decision
        && !payload.transfer_safeguards;

    let risk_level = if special_category || unguarded_transfers {
        RiskLevel::High
    } else if payload.international_transfers || payload.large_scale_processing {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let dpia_required =
        special_category || (payload.large_scale_processing && payload.international_transfers);

    GdprDerived {
        special_category,
        risk_level,
        dpia_required,
        dpo_consultation_required: dpia_required && !payload.dpia_completed,
        supervisory_notification_required: unguarded_transfers,
    }
}

/// Evaluate the GDPR rule-set against one processing declaration
pub fn evaluate(config: &GdprConfig, payload: &GdprPayload) -> RuleSetEvaluation {
    let derived = derive_exposure(payload);

    let checks = vec![
        lawful_basis_check(payload),
        subject_rights_check(payload),
        retention_check(config, payload),
        transfer_and_risk_check(payload, &derived),
    ];

    let total_errors: usize = checks.iter().map(|c| c.errors.len()).sum();
    let valid = total_errors == 0 || (!config.strict_mode && total_errors <= 1);

    RuleSetEvaluation {
        subject: payload.processing_purpose.clone(),
        checks,
        valid,
        detail: StandardDetail::Gdpr {
            lawful_basis: payload.lawful_basis.clone(),
            data_categories: payload.data_categories.clone(),
            risk_level: derived.risk_level,
            dpia_required: derived.dpia_required,
            dpo_consultation_required: derived.dpo_consultation_required,
            supervisory_notification_required: derived.supervisory_notification_required,
        },
    }
}

fn lawful_basis_check(payload: &GdprPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match payload.lawful_basis.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("Lawful basis for processing must be specified".to_string());
        }
        Some(basis) => {
            let upper = basis.to_uppercase();
            if !LAWFUL_BASES.contains(&upper.as_str()) {
                errors.push(format!("Invalid lawful basis specified: {}", basis));
            }

            if upper == "LEGITIMATE_INTERESTS" {
                warnings.push(
                    "Legitimate interests basis requires balancing test documentation".to_string(),
                );
            }

            if upper == "CONSENT" && payload.processing_purpose.to_lowercase().contains("legal") {
                warnings.push("Consent may not be appropriate for legal obligations".to_string());
            }
        }
    }

    SubCheck::new("lawful_basis", errors, warnings)
}

fn subject_rights_check(payload: &GdprPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(rights) = payload.subject_rights.as_ref().and_then(Value::as_object) else {
        errors.push("Data subject rights implementation not documented".to_string());
        return SubCheck::new("subject_rights", errors, warnings);
    };

    for right in MANDATORY_RIGHTS {
        match rights.get(*right) {
            None => errors.push(format!("{} implementation not found", right)),
            Some(implementation) => {
                let implemented = implementation
                    .get("implemented")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !implemented {
                    errors.push(format!("{} not implemented", right));
                }
            }
        }
    }

    for right in ADVISORY_RIGHTS {
        let implemented = rights
            .get(*right)
            .and_then(|r| r.get("implemented"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !implemented {
            warnings.push(format!("{} not implemented", right));
        }
    }

    // Access requests must be answerable within the statutory month
    if let Some(access) = rights.get("rightToAccess") {
        match access.get("responseTimeLimitDays").and_then(Value::as_i64) {
            Some(days) if days > 30 => warnings.push(
                "Response time for access requests exceeds recommended 30 days".to_string(),
            ),
            Some(_) => {}
            None => warnings
                .push("Response time limit for access requests not specified".to_string()),
        }
    }

    SubCheck::new("subject_rights", errors, warnings)
}

fn retention_check(config: &GdprConfig, payload: &GdprPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(policy) = payload.retention_policy.as_ref().and_then(Value::as_object) else {
        errors.push("Data retention policy not documented".to_string());
        return SubCheck::new("retention", errors, warnings);
    };

    match policy.get("retentionPeriods").and_then(Value::as_object) {
        None => errors.push("Data retention periods not defined".to_string()),
        Some(periods) if periods.is_empty() => {
            errors.push("No retention periods specified".to_string())
        }
        Some(periods) => {
            for (data_type, days) in periods {
                if let Some(days) = days.as_i64() {
                    if days > config.max_retention_days {
                        warnings.push(format!(
                            "Retention period for {} ({} days) exceeds recommended maximum",
                            data_type, days
                        ));
                    }
                }
            }
        }
    }

    let automatic_deletion = policy
        .get("automaticDeletionEnabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !automatic_deletion {
        errors.push("Automatic deletion mechanism not enabled".to_string());
    }

    if !policy.contains_key("retentionJustification") {
        warnings.push("Retention period justification not documented".to_string());
    }

    SubCheck::new("retention", errors, warnings)
}

fn transfer_and_risk_check(payload: &GdprPayload, derived: &GdprDerived) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if derived.special_category {
        warnings.push(
            "Special category data processing requires an Article 9 condition".to_string(),
        );

        if matches!(
            payload.lawful_basis.as_deref().map(str::to_uppercase).as_deref(),
            Some("CONSENT") | Some("LEGITIMATE_INTERESTS")
        ) {
            warnings.push(
                "Special category data requires explicit consent or another Article 9 condition"
                    .to_string(),
            );
        }
    }

    if payload.international_transfers
        && !payload.adequacy_decision
        && !payload.transfer_safeguards
    {
        errors.push(
            "International transfers require an adequacy decision or appropriate safeguards"
                .to_string(),
        );
    }

    if derived.dpia_required && !payload.dpia_completed {
        warnings.push("Data protection impact assessment required but not completed".to_string());
    }

    SubCheck::new("transfers_and_risk", errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(strict: bool) -> GdprConfig {
        GdprConfig {
            enabled: true,
            strict_mode: strict,
            max_retention_days: 2555,
        }
    }

    fn full_rights() -> Value {
        json!({
            "rightToAccess": {"implemented": true, "responseTimeLimitDays": 15},
            "rightToRectification": {"implemented": true},
            "rightToErasure": {"implemented": true},
            "rightToRestrictProcessing": {"implemented": true},
            "rightToDataPortability": {"implemented": true},
            "rightToObject": {"implemented": true}
        })
    }

    fn full_retention() -> Value {
        json!({
            "retentionPeriods": {"beneficiary_profiles": 1825, "payment_history": 2555},
            "automaticDeletionEnabled": true,
            "retentionJustification": "statutory audit requirements"
        })
    }

    fn compliant_payload() -> GdprPayload {
        GdprPayload {
            processing_purpose: "benefit eligibility assessment".to_string(),
            lawful_basis: Some("PUBLIC_TASK".to_string()),
            data_categories: vec!["identity".to_string(), "income".to_string()],
            special_category_data: false,
            large_scale_processing: false,
            international_transfers: false,
            adequacy_decision: false,
            transfer_safeguards: false,
            subject_rights: Some(full_rights()),
            retention_policy: Some(full_retention()),
            dpia_completed: false,
        }
    }

    #[test]
    fn test_compliant_processing_passes() {
        let result = evaluate(&config(true), &compliant_payload());

        assert!(result.valid);
        assert!(result.checks.iter().all(|c| c.errors.is_empty()));

        let StandardDetail::Gdpr {
            risk_level,
            dpia_required,
            supervisory_notification_required,
            ..
        } = result.detail
        else {
            panic!("expected GDPR detail");
        };
        assert_eq!(risk_level, RiskLevel::Low);
        assert!(!dpia_required);
        assert!(!supervisory_notification_required);
    }

    #[test]
    fn test_special_category_data_forces_dpia_and_high_risk() {
        // Otherwise fully compliant: the exposure flags must still fire
        let mut payload = compliant_payload();
        payload.special_category_data = true;
        payload.dpia_completed = false;

        let result = evaluate(&config(true), &payload);

        let StandardDetail::Gdpr {
            risk_level,
            dpia_required,
            dpo_consultation_required,
            ..
        } = result.detail
        else {
            panic!("expected GDPR detail");
        };
        assert_eq!(risk_level, RiskLevel::High);
        assert!(dpia_required);
        assert!(dpo_consultation_required);
    }

    #[test]
    fn test_special_category_detected_from_category_list() {
        let mut payload = compliant_payload();
        payload.data_categories = vec!["health records".to_string()];

        let derived = derive_exposure(&payload);
        assert!(derived.special_category);
        assert_eq!(derived.risk_level, RiskLevel::High);
        assert!(derived.dpia_required);
    }

    #[test]
    fn test_missing_lawful_basis_is_error() {
        let mut payload = compliant_payload();
        payload.lawful_basis = None;

        let result = evaluate(&config(true), &payload);
        assert!(!result.valid);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("must be specified")));
    }

    #[test]
    fn test_invalid_lawful_basis_is_error() {
        let mut payload = compliant_payload();
        payload.lawful_basis = Some("BECAUSE_WE_WANT_TO".to_string());

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("Invalid lawful basis")));
    }

    #[test]
    fn test_legitimate_interests_draws_balancing_warning() {
        let mut payload = compliant_payload();
        payload.lawful_basis = Some("LEGITIMATE_INTERESTS".to_string());

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[0]
            .warnings
            .iter()
            .any(|w| w.contains("balancing test")));
    }

    #[test]
    fn test_missing_mandatory_rights_are_errors() {
        let mut payload = compliant_payload();
        payload.subject_rights = Some(json!({
            "rightToAccess": {"implemented": true}
        }));

        let result = evaluate(&config(true), &payload);
        let rights = &result.checks[1];
        assert_eq!(rights.errors.len(), 3); // rectification, erasure, restriction
    }

    #[test]
    fn test_unimplemented_right_is_error() {
        let mut payload = compliant_payload();
        let mut rights = full_rights();
        rights["rightToErasure"] = json!({"implemented": false});
        payload.subject_rights = Some(rights);

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[1]
            .errors
            .iter()
            .any(|e| e.contains("rightToErasure not implemented")));
    }

    #[test]
    fn test_missing_retention_policy_is_error() {
        let mut payload = compliant_payload();
        payload.retention_policy = None;

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[2]
            .errors
            .iter()
            .any(|e| e.contains("not documented")));
    }

    #[test]
    fn test_excessive_retention_is_warning() {
        let mut payload = compliant_payload();
        let mut retention = full_retention();
        retention["retentionPeriods"]["raw_biometrics"] = json!(9000);
        payload.retention_policy = Some(retention);

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[2]
            .warnings
            .iter()
            .any(|w| w.contains("exceeds recommended maximum")));
    }

    #[test]
    fn test_unguarded_international_transfers() {
        let mut payload = compliant_payload();
        payload.international_transfers = true;

        let result = evaluate(&config(true), &payload);
        assert!(!result.valid);

        let StandardDetail::Gdpr {
            risk_level,
            supervisory_notification_required,
            ..
        } = result.detail
        else {
            panic!("expected GDPR detail");
        };
        assert_eq!(risk_level, RiskLevel::High);
        assert!(supervisory_notification_required);
    }

    #[test]
    fn test_safeguarded_transfers_are_medium_risk() {
        let mut payload = compliant_payload();
        payload.international_transfers = true;
        payload.transfer_safeguards = true;

        let result = evaluate(&config(true), &payload);
        assert!(result.valid);

        let StandardDetail::Gdpr {
            risk_level,
            supervisory_notification_required,
            ..
        } = result.detail
        else {
            panic!("expected GDPR detail");
        };
        assert_eq!(risk_level, RiskLevel::Medium);
        assert!(!supervisory_notification_required);
    }

    #[test]
    fn test_non_strict_tolerates_single_error() {
        let mut payload = compliant_payload();
        payload.lawful_basis = None;

        assert!(!evaluate(&config(true), &payload).valid);
        assert!(evaluate(&config(false), &payload).valid);
    }
}
