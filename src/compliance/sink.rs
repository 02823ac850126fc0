use crate::compliance::types::NewComplianceRecord;
use crate::db::schema::ComplianceRecord;
use crate::db::compliance as compliance_db;
use crate::errors::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// Destination for compliance audit records. Records are append-only:
/// the trait deliberately exposes no update or delete operation.
#[async_trait]
pub trait ComplianceSink: Send + Sync {
    async fn append(&self, record: NewComplianceRecord) -> Result<ComplianceRecord>;
}

/// PostgreSQL sink for compliance records
pub struct PostgresComplianceSink {
    pool: PgPool,
}

impl PostgresComplianceSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComplianceSink for PostgresComplianceSink {
    async fn append(&self, record: NewComplianceRecord) -> Result<ComplianceRecord> {
        compliance_db::insert(&self.pool, &record).await
    }
}
