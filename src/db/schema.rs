// Database schema types and status enums

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// External System
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExternalSystem {
    pub id: Uuid,
    pub system_code: String,
    pub system_name: String,
    pub organization: String,
    pub system_type: String,
    pub integration_type: String,
    pub environment: String,
    pub base_url: String,
    pub api_version: Option<String>,
    pub auth_type: String,
    pub credentials_ref: Option<String>,
    pub timeout_seconds: i32,
    pub rate_limit_per_minute: Option<i32>,
    pub rate_limit_per_hour: Option<i32>,
    pub rate_limit_per_day: Option<i32>,
    pub is_active: bool,
    pub status: String,
    pub last_health_check_at: Option<DateTime<Utc>>,
    pub total_successful_calls: i64,
    pub total_failed_calls: i64,
    pub average_response_time_ms: Option<f64>,
    pub last_successful_call_at: Option<DateTime<Utc>>,
    pub last_failed_call_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalSystem {
    /// Whether the system accepts traffic at all.
    pub fn is_available(&self) -> bool {
        self.is_active && self.status != SystemStatus::Disabled.as_str()
    }

    /// Fraction of recorded calls that failed, 0.0 when no calls yet.
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_successful_calls + self.total_failed_calls;
        if total == 0 {
            return 0.0;
        }
        self.total_failed_calls as f64 / total as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_successful_calls + self.total_failed_calls;
        if total == 0 {
            return 0.0;
        }
        self.total_successful_calls as f64 / total as f64
    }

    /// Derived health classification. Never stored: computed from the last
    /// health check outcome and the rolling call counters.
    pub fn is_unhealthy(&self, failure_rate_threshold: f64) -> bool {
        self.status == SystemStatus::Error.as_str()
            || self.failure_rate() > failure_rate_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    Active,
    Degraded,
    Error,
    Disabled,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Active => "ACTIVE",
            SystemStatus::Degraded => "DEGRADED",
            SystemStatus::Error => "ERROR",
            SystemStatus::Disabled => "DISABLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(SystemStatus::Active),
            "DEGRADED" => Some(SystemStatus::Degraded),
            "ERROR" => Some(SystemStatus::Error),
            "DISABLED" => Some(SystemStatus::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemType {
    GovernmentAgency,
    FinancialServiceProvider,
    IdentityProvider,
    PaymentGateway,
    DataProvider,
    StandardsGateway,
    ThirdPartyService,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::GovernmentAgency => "GOVERNMENT_AGENCY",
            SystemType::FinancialServiceProvider => "FINANCIAL_SERVICE_PROVIDER",
            SystemType::IdentityProvider => "IDENTITY_PROVIDER",
            SystemType::PaymentGateway => "PAYMENT_GATEWAY",
            SystemType::DataProvider => "DATA_PROVIDER",
            SystemType::StandardsGateway => "STANDARDS_GATEWAY",
            SystemType::ThirdPartyService => "THIRD_PARTY_SERVICE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GOVERNMENT_AGENCY" => Some(SystemType::GovernmentAgency),
            "FINANCIAL_SERVICE_PROVIDER" => Some(SystemType::FinancialServiceProvider),
            "IDENTITY_PROVIDER" => Some(SystemType::IdentityProvider),
            "PAYMENT_GATEWAY" => Some(SystemType::PaymentGateway),
            "DATA_PROVIDER" => Some(SystemType::DataProvider),
            "STANDARDS_GATEWAY" => Some(SystemType::StandardsGateway),
            "THIRD_PARTY_SERVICE" => Some(SystemType::ThirdPartyService),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationType {
    RestApi,
    SoapWebService,
    FileTransfer,
    MessageQueue,
    Webhook,
    BatchProcessing,
}

impl IntegrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationType::RestApi => "REST_API",
            IntegrationType::SoapWebService => "SOAP_WEB_SERVICE",
            IntegrationType::FileTransfer => "FILE_TRANSFER",
            IntegrationType::MessageQueue => "MESSAGE_QUEUE",
            IntegrationType::Webhook => "WEBHOOK",
            IntegrationType::BatchProcessing => "BATCH_PROCESSING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "REST_API" => Some(IntegrationType::RestApi),
            "SOAP_WEB_SERVICE" => Some(IntegrationType::SoapWebService),
            "FILE_TRANSFER" => Some(IntegrationType::FileTransfer),
            "MESSAGE_QUEUE" => Some(IntegrationType::MessageQueue),
            "WEBHOOK" => Some(IntegrationType::Webhook),
            "BATCH_PROCESSING" => Some(IntegrationType::BatchProcessing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
    None,
    ApiKey,
    Bearer,
    Basic,
    OAuth2ClientCredentials,
    MutualTls,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::None => "NONE",
            AuthScheme::ApiKey => "API_KEY",
            AuthScheme::Bearer => "BEARER",
            AuthScheme::Basic => "BASIC",
            AuthScheme::OAuth2ClientCredentials => "OAUTH2_CLIENT_CREDENTIALS",
            AuthScheme::MutualTls => "MUTUAL_TLS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(AuthScheme::None),
            "API_KEY" => Some(AuthScheme::ApiKey),
            "BEARER" => Some(AuthScheme::Bearer),
            "BASIC" => Some(AuthScheme::Basic),
            "OAUTH2_CLIENT_CREDENTIALS" => Some(AuthScheme::OAuth2ClientCredentials),
            "MUTUAL_TLS" => Some(AuthScheme::MutualTls),
            _ => None,
        }
    }
}

// ============================================================================
// Service Delivery Record
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceDeliveryRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub external_transaction_id: Option<String>,
    pub beneficiary_id: String,
    pub household_id: Option<Uuid>,
    pub program_code: String,
    pub providing_agency: String,
    pub service_type: String,
    pub delivery_method: Option<String>,
    pub amount: Option<BigDecimal>,
    pub target_system: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub is_duplicate: bool,
    pub original_record_id: Option<Uuid>,
    pub dedupe_hash: String,
    pub reconciliation_status: Option<String>,
    pub reconciliation_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub verification_method: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceDeliveryRecord {
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        DeliveryStatus::from_str(&self.status)
    }

    /// Whether the record is in a state the system will never move it out of.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.delivery_status(),
            Some(DeliveryStatus::Confirmed) | Some(DeliveryStatus::Reconciled)
        ) || (self.status == DeliveryStatus::Failed.as_str() && self.next_retry_at.is_none())
    }

    /// Whether the retry sweep may pick this record up.
    pub fn is_retry_eligible(&self, max_retries: u32, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Failed.as_str()
            && !self.is_duplicate
            && (self.retry_count as u32) < max_retries
            && self.next_retry_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Confirmed,
    Failed,
    Reconciled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Confirmed => "CONFIRMED",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Reconciled => "RECONCILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DeliveryStatus::Pending),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            "CONFIRMED" => Some(DeliveryStatus::Confirmed),
            "FAILED" => Some(DeliveryStatus::Failed),
            "RECONCILED" => Some(DeliveryStatus::Reconciled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    Pending,
    Matched,
    Mismatched,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "PENDING",
            ReconciliationStatus::Matched => "MATCHED",
            ReconciliationStatus::Mismatched => "MISMATCHED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReconciliationStatus::Pending),
            "MATCHED" => Some(ReconciliationStatus::Matched),
            "MISMATCHED" => Some(ReconciliationStatus::Mismatched),
            _ => None,
        }
    }
}

// ============================================================================
// Compliance Record
// ============================================================================

/// Immutable audit entry of a single compliance check. Corrections are new
/// records; no update path exists anywhere in the crate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ComplianceRecord {
    pub id: Uuid,
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
