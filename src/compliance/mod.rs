pub mod engine;
pub mod fhir;
pub mod gdpr;
pub mod oidc;
pub mod sink;
pub mod types;

pub use engine::ComplianceEngine;
pub use sink::{ComplianceSink, PostgresComplianceSink};
pub use types::{ComplianceLevel, Standard, StandardPayload, ValidationOutcome};
