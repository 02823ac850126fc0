use crate::db::schema::ServiceDeliveryRecord;
use crate::errors::{GatewayError, Result};
use bigdecimal::BigDecimal;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A delivery submission from an upstream registry/payment/eligibility
/// service. The (beneficiary, program, service type, amount) tuple and the
/// optional external reference are the idempotency-relevant fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub beneficiary_id: String,
    #[serde(default)]
    pub household_id: Option<Uuid>,
    pub program_code: String,
    pub providing_agency: String,
    pub service_type: String,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub amount: Option<BigDecimal>,
    pub target_system: String,
    /// Partner-side reference when the caller already holds one; matched
    /// against earlier records during duplicate detection.
    #[serde(default)]
    pub external_reference: Option<String>,
    /// When false, even retryable failures are left terminal.
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,
}

fn default_true() -> bool {
    true
}

impl DeliveryRequest {
    pub fn validate(&self) -> Result<()> {
        if self.beneficiary_id.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "Beneficiary ID cannot be empty".to_string(),
            ));
        }
        if self.program_code.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "Program code cannot be empty".to_string(),
            ));
        }
        if self.providing_agency.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "Providing agency cannot be empty".to_string(),
            ));
        }
        if self.service_type.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "Service type cannot be empty".to_string(),
            ));
        }
        if self.target_system.trim().is_empty() {
            return Err(GatewayError::ValidationError(
                "Target system cannot be empty".to_string(),
            ));
        }
        if let Some(amount) = &self.amount {
            if amount < &BigDecimal::from(0) {
                return Err(GatewayError::ValidationError(
                    "Amount cannot be negative".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Digest of the logical transaction tuple, used for duplicate lookups.
    /// The digest is stored alongside the record so the window query stays
    /// a single indexed comparison.
    pub fn dedupe_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.beneficiary_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.program_code.as_bytes());
        hasher.update(b"|");
        hasher.update(self.service_type.as_bytes());
        hasher.update(b"|");
        if let Some(amount) = &self.amount {
            hasher.update(amount.to_string().as_bytes());
        }

        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Insert payload for a new delivery record
#[derive(Debug, Clone)]
pub struct NewDeliveryRecord {
    pub transaction_id: String,
    pub beneficiary_id: String,
    pub household_id: Option<Uuid>,
    pub program_code: String,
    pub providing_agency: String,
    pub service_type: String,
    pub delivery_method: Option<String>,
    pub amount: Option<BigDecimal>,
    pub target_system: String,
    pub is_duplicate: bool,
    pub original_record_id: Option<Uuid>,
    pub dedupe_hash: String,
}

impl NewDeliveryRecord {
    pub fn from_request(request: &DeliveryRequest) -> Self {
        Self {
            transaction_id: generate_transaction_id(),
            beneficiary_id: request.beneficiary_id.clone(),
            household_id: request.household_id,
            program_code: request.program_code.clone(),
            providing_agency: request.providing_agency.clone(),
            service_type: request.service_type.clone(),
            delivery_method: request.delivery_method.clone(),
            amount: request.amount.clone(),
            target_system: request.target_system.clone(),
            is_duplicate: false,
            original_record_id: None,
            dedupe_hash: request.dedupe_hash(),
        }
    }

    /// A duplicate-flagged shadow of the request, pointing at the record it
    /// would have re-delivered.
    pub fn duplicate_of(request: &DeliveryRequest, original: &ServiceDeliveryRecord) -> Self {
        let mut record = Self::from_request(request);
        record.is_duplicate = true;
        record.original_record_id = Some(original.id);
        record
    }

    #[cfg(test)]
    pub fn test_fixture(tag: &str) -> Self {
        Self {
            transaction_id: format!("TXN-TEST-{}-{}", tag, Uuid::new_v4().simple()),
            beneficiary_id: format!("PSN-{}", tag),
            household_id: None,
            program_code: "4PS".to_string(),
            providing_agency: "DSWD".to_string(),
            service_type: "CASH_TRANSFER".to_string(),
            delivery_method: Some("BANK_TRANSFER".to_string()),
            amount: None,
            target_system: "FSP".to_string(),
            is_duplicate: false,
            original_record_id: None,
            dedupe_hash: format!("hash-{}", tag),
        }
    }
}

/// Generate a unique transaction ID. IDs are never reused: the timestamp
/// prefix keeps them sortable, the UUID suffix keeps them unique.
pub fn generate_transaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "TXN-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8].to_uppercase()
    )
}

/// Exponential retry backoff: base doubling per attempt, capped.
pub fn retry_backoff(retry_count: u32, base_seconds: u64, cap_seconds: u64) -> Duration {
    let exponent = retry_count.min(30);
    let delay = base_seconds.saturating_mul(1u64 << exponent).min(cap_seconds);
    Duration::seconds(delay as i64)
}

/// Outcome of a delivery submission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    /// The partner accepted the delivery
    Delivered { record: ServiceDeliveryRecord },
    /// A retryable failure; the sweep owns the record from here
    QueuedForRetry { record: ServiceDeliveryRecord },
    /// A non-retryable failure, surfaced synchronously so upstream logic
    /// can react without waiting for a retry cycle that will never succeed
    FailedPermanently { record: ServiceDeliveryRecord },
    /// The submission duplicates an earlier transaction; nothing was sent
    Duplicate {
        original: ServiceDeliveryRecord,
        duplicate_record_id: Uuid,
    },
}

impl DeliveryOutcome {
    /// The record upstream callers should track
    pub fn record(&self) -> &ServiceDeliveryRecord {
        match self {
            DeliveryOutcome::Delivered { record } => record,
            DeliveryOutcome::QueuedForRetry { record } => record,
            DeliveryOutcome::FailedPermanently { record } => record,
            DeliveryOutcome::Duplicate { original, .. } => original,
        }
    }
}
