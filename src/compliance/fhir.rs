// Interoperable-health-record (FHIR) validation rules.
//
// Pure functions of the supplied resource and configuration: structure
// against required fields per resource type, optional profile checks,
// optional terminology checks of coded values. Strict mode escalates the
// advisory findings that non-strict deployments tolerate.

use crate::compliance::types::{RuleSetEvaluation, StandardDetail, SubCheck};
use crate::config::FhirConfig;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Deserialize)]
pub struct FhirPayload {
    pub resource_type: String,
    pub resource: Value,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default = "default_true")]
    pub validate_terminology: bool,
}

fn default_true() -> bool {
    true
}

/// Required fields per known resource type
static REQUIRED_FIELDS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("patient", vec!["identifier", "name", "gender"]),
        ("observation", vec!["status", "code", "subject"]),
        ("condition", vec!["code", "subject"]),
        ("medication", vec!["code"]),
        ("immunization", vec!["status", "vaccineCode", "patient"]),
        ("coverage", vec!["status", "beneficiary"]),
    ])
});

/// Fields that must be single values, not arrays
static SINGLE_VALUE_FIELDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["id", "resourceType", "status", "gender", "birthDate"]));

/// Fields that carry repeating elements
static ARRAY_FIELDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["identifier", "name", "telecom", "address", "contact"]));

static KNOWN_CODING_SYSTEMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "http://snomed.info/sct",
        "http://loinc.org",
        "http://hl7.org/fhir/sid/icd-10",
        "http://hl7.org/fhir/administrative-gender",
        "http://hl7.org/fhir/observation-status",
    ])
});

static KNOWN_PROFILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "http://hl7.org/fhir/StructureDefinition/Patient",
        "http://hl7.org/fhir/StructureDefinition/Observation",
        "http://hl7.org/fhir/StructureDefinition/Condition",
        "http://hl7.org/fhir/StructureDefinition/Medication",
        "http://hl7.org/fhir/StructureDefinition/Immunization",
        "http://hl7.org/fhir/StructureDefinition/Coverage",
    ])
});

static PATIENT_STATUSES: &[&str] = &["active", "inactive", "entered-in-error", "unknown"];
static OBSERVATION_STATUSES: &[&str] = &[
    "registered",
    "preliminary",
    "final",
    "amended",
    "corrected",
    "cancelled",
    "entered-in-error",
    "unknown",
];
static GENDERS: &[&str] = &["male", "female", "other", "unknown"];

/// Evaluate the FHIR rule-set against one resource
pub fn evaluate(config: &FhirConfig, payload: &FhirPayload) -> RuleSetEvaluation {
    let mut checks = vec![structure_check(config, payload)];

    if payload.validate_terminology {
        checks.push(terminology_check(config, payload));
    }

    checks.push(profile_check(config, payload));

    let total_errors: usize = checks.iter().map(|c| c.errors.len()).sum();
    // Non-strict deployments tolerate a couple of structural findings
    let valid = total_errors == 0 || (!config.strict_mode && total_errors <= 2);

    RuleSetEvaluation {
        subject: payload.resource_type.clone(),
        checks,
        valid,
        detail: StandardDetail::Fhir {
            resource_type: payload.resource_type.clone(),
            fhir_version: config.fhir_version.clone(),
            profiles: payload.profiles.clone(),
        },
    }
}

fn structure_check(config: &FhirConfig, payload: &FhirPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(resource) = payload.resource.as_object() else {
        errors.push("Resource must be a JSON object".to_string());
        return SubCheck::new("structure", errors, warnings);
    };

    let resource_type = payload.resource_type.to_lowercase();

    match REQUIRED_FIELDS.get(resource_type.as_str()) {
        Some(required) => {
            for field in required {
                if resource.get(*field).map(|v| v.is_null()).unwrap_or(true) {
                    errors.push(format!(
                        "{} resource must have {}",
                        payload.resource_type, field
                    ));
                }
            }
        }
        None => {
            if resource.get("resourceType").is_none() {
                errors.push("Resource must have resourceType specified".to_string());
            }
            warnings.push(format!(
                "No structural rules for resource type {}",
                payload.resource_type
            ));
        }
    }

    // Cardinality: single-value fields must not be arrays, repeating
    // elements should be arrays
    for (field, value) in resource {
        if SINGLE_VALUE_FIELDS.contains(field.as_str()) && value.is_array() {
            errors.push(format!("Field {} must be a single value, not an array", field));
        }
        if ARRAY_FIELDS.contains(field.as_str()) && !value.is_array() && !value.is_null() {
            warnings.push(format!("Field {} should be an array", field));
        }
    }

    // Coded value sets
    if let Some(status) = resource.get("status").and_then(Value::as_str) {
        let valid_statuses: Option<&[&str]> = match resource_type.as_str() {
            "patient" => Some(PATIENT_STATUSES),
            "observation" => Some(OBSERVATION_STATUSES),
            _ => None,
        };
        if let Some(valid_statuses) = valid_statuses {
            if !valid_statuses.contains(&status.to_lowercase().as_str()) {
                errors.push(format!(
                    "Invalid status '{}' for {} resource",
                    status, payload.resource_type
                ));
            }
        }
    }

    if let Some(gender) = resource.get("gender").and_then(Value::as_str) {
        if !GENDERS.contains(&gender.to_lowercase().as_str()) {
            errors.push(format!("Invalid gender value '{}'", gender));
        }
    }

    if let Some(identifiers) = resource.get("identifier").and_then(Value::as_array) {
        for identifier in identifiers {
            if let Some(map) = identifier.as_object() {
                if !map.contains_key("value") {
                    errors.push("Identifier must have a value".to_string());
                }
                if !map.contains_key("system") {
                    let finding = "Identifier should have a system specified".to_string();
                    if config.strict_mode {
                        errors.push(finding);
                    } else {
                        warnings.push(finding);
                    }
                }
            }
        }
    }

    SubCheck::new("structure", errors, warnings)
}

fn terminology_check(config: &FhirConfig, payload: &FhirPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(resource) = payload.resource.as_object() else {
        return SubCheck::new("terminology", errors, warnings);
    };

    for (field, value) in resource {
        let Some(coding) = value.as_object() else {
            continue;
        };

        let looks_coded = coding.contains_key("code") || coding.contains_key("system");
        if !looks_coded {
            continue;
        }

        if !coding.contains_key("code") {
            errors.push(format!("Coding field {} must have a code", field));
        }

        match coding.get("system").and_then(Value::as_str) {
            Some(system) => {
                if !KNOWN_CODING_SYSTEMS.contains(system) {
                    let finding = format!("Unrecognized coding system: {}", system);
                    if config.strict_mode {
                        errors.push(finding);
                    } else {
                        warnings.push(finding);
                    }
                }
            }
            None => {
                warnings.push(format!("Coding field {} should have a system", field));
            }
        }
    }

    SubCheck::new("terminology", errors, warnings)
}

fn profile_check(config: &FhirConfig, payload: &FhirPayload) -> SubCheck {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if payload.profiles.is_empty() {
        // Base profile: the resource must at least declare its type
        if payload
            .resource
            .as_object()
            .map(|r| !r.contains_key("resourceType"))
            .unwrap_or(true)
        {
            errors.push("Resource must have resourceType field".to_string());
        }
        return SubCheck::new("profiles", errors, warnings);
    }

    for profile in &payload.profiles {
        if !KNOWN_PROFILES.contains(profile.as_str()) {
            let finding = format!("Unknown profile: {}", profile);
            if config.strict_mode {
                errors.push(finding);
            } else {
                warnings.push(finding);
            }
        }
    }

    SubCheck::new("profiles", errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(strict: bool) -> FhirConfig {
        FhirConfig {
            enabled: true,
            strict_mode: strict,
            fhir_version: "R4".to_string(),
        }
    }

    fn patient_payload(resource: Value) -> FhirPayload {
        FhirPayload {
            resource_type: "Patient".to_string(),
            resource,
            profiles: vec![],
            validate_terminology: true,
        }
    }

    fn valid_patient() -> Value {
        json!({
            "resourceType": "Patient",
            "identifier": [{"system": "http://hl7.org/fhir/sid/icd-10", "value": "PSN-1"}],
            "name": [{"family": "Dela Cruz", "given": ["Juan"]}],
            "gender": "male"
        })
    }

    #[test]
    fn test_valid_patient_passes() {
        let result = evaluate(&config(true), &patient_payload(valid_patient()));

        assert!(result.valid);
        let errors: Vec<_> = result.checks.iter().flat_map(|c| c.errors.clone()).collect();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_missing_required_fields_are_errors() {
        let resource = json!({"resourceType": "Patient"});
        let result = evaluate(&config(true), &patient_payload(resource));

        assert!(!result.valid);
        let structure = &result.checks[0];
        assert_eq!(structure.errors.len(), 3); // identifier, name, gender
    }

    #[test]
    fn test_non_strict_tolerates_up_to_two_errors() {
        // Missing gender and identifier: two findings
        let resource = json!({
            "resourceType": "Patient",
            "name": [{"family": "Santos"}]
        });

        let lenient = evaluate(&config(false), &patient_payload(resource.clone()));
        assert!(lenient.valid);
        // The level still reflects the findings through the error list

        let strict = evaluate(&config(true), &patient_payload(resource));
        assert!(!strict.valid);
    }

    #[test]
    fn test_invalid_gender_value() {
        let mut resource = valid_patient();
        resource["gender"] = json!("robot");

        let result = evaluate(&config(true), &patient_payload(resource));
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("Invalid gender")));
    }

    #[test]
    fn test_invalid_observation_status() {
        let payload = FhirPayload {
            resource_type: "Observation".to_string(),
            resource: json!({
                "resourceType": "Observation",
                "status": "guessed",
                "code": {"system": "http://loinc.org", "code": "8867-4"},
                "subject": {"reference": "Patient/1"}
            }),
            profiles: vec![],
            validate_terminology: true,
        };

        let result = evaluate(&config(true), &payload);
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("Invalid status 'guessed'")));
    }

    #[test]
    fn test_single_value_field_as_array_is_error() {
        let mut resource = valid_patient();
        resource["gender"] = json!(["male"]);

        let result = evaluate(&config(true), &patient_payload(resource));
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("single value")));
    }

    #[test]
    fn test_unknown_coding_system_escalates_in_strict_mode() {
        let payload = FhirPayload {
            resource_type: "Condition".to_string(),
            resource: json!({
                "resourceType": "Condition",
                "code": {"system": "http://example.com/homegrown", "code": "X1"},
                "subject": {"reference": "Patient/1"}
            }),
            profiles: vec![],
            validate_terminology: true,
        };

        let lenient = evaluate(&config(false), &payload);
        let terminology = &lenient.checks[1];
        assert!(terminology.errors.is_empty());
        assert!(terminology
            .warnings
            .iter()
            .any(|w| w.contains("Unrecognized coding system")));

        let strict = evaluate(&config(true), &payload);
        let terminology = &strict.checks[1];
        assert!(terminology
            .errors
            .iter()
            .any(|e| e.contains("Unrecognized coding system")));
    }

    #[test]
    fn test_unknown_profile_is_warning_unless_strict() {
        let mut payload = patient_payload(valid_patient());
        payload.profiles = vec!["http://example.com/profiles/custom".to_string()];

        let lenient = evaluate(&config(false), &payload);
        let profiles = lenient.checks.last().unwrap();
        assert!(profiles.errors.is_empty());
        assert_eq!(profiles.warnings.len(), 1);

        let strict = evaluate(&config(true), &payload);
        let profiles = strict.checks.last().unwrap();
        assert_eq!(profiles.errors.len(), 1);
    }

    #[test]
    fn test_known_profile_passes() {
        let mut payload = patient_payload(valid_patient());
        payload.profiles = vec!["http://hl7.org/fhir/StructureDefinition/Patient".to_string()];

        let result = evaluate(&config(true), &payload);
        let profiles = result.checks.last().unwrap();
        assert!(profiles.errors.is_empty());
        assert!(profiles.warnings.is_empty());
    }

    #[test]
    fn test_non_object_resource_is_rejected() {
        let result = evaluate(&config(false), &patient_payload(json!("not an object")));
        assert!(result.checks[0]
            .errors
            .iter()
            .any(|e| e.contains("JSON object")));
    }

    #[test]
    fn test_terminology_can_be_skipped() {
        let mut payload = patient_payload(valid_patient());
        payload.validate_terminology = false;

        let result = evaluate(&config(true), &payload);
        assert!(result.checks.iter().all(|c| c.name != "terminology"));
    }
}
