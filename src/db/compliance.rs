// Database queries for compliance records.
//
// The table is append-only: inserts and reads, no update statements.

use crate::compliance::types::NewComplianceRecord;
use crate::db::schema::ComplianceRecord;
use crate::errors::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

const COMPLIANCE_COLUMNS: &str = "id, standard, subject, compliant, score, level, category, \
     severity, details, checked_by, checked_at, expires_at";

/// Append a compliance record
pub async fn insert(pool: &PgPool, record: &NewComplianceRecord) -> Result<ComplianceRecord> {
    let sql = format!(
        r#"
        INSERT INTO compliance_records (
            standard, subject, compliant, score, level, category, severity,
            details, checked_by, checked_at, expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {COMPLIANCE_COLUMNS}
        "#
    );

    let inserted = sqlx::query_as::<_, ComplianceRecord>(&sql)
        .bind(&record.standard)
        .bind(&record.subject)
        .bind(record.compliant)
        .bind(record.score)
        .bind(&record.level)
        .bind(&record.category)
        .bind(&record.severity)
        .bind(&record.details)
        .bind(&record.checked_by)
        .bind(record.checked_at)
        .bind(record.expires_at)
        .fetch_one(pool)
        .await?;

    Ok(inserted)
}

/// List records with optional standard/subject filters, newest first
pub async fn list(
    pool: &PgPool,
    standard: Option<&str>,
    subject: Option<&str>,
    limit: i64,
) -> Result<Vec<ComplianceRecord>> {
    let sql = format!(
        r#"
        SELECT {COMPLIANCE_COLUMNS} FROM compliance_records
        WHERE ($1::text IS NULL OR standard = $1)
            AND ($2::text IS NULL OR subject = $2)
        ORDER BY checked_at DESC
        LIMIT $3
        "#
    );

    let records = sqlx::query_as::<_, ComplianceRecord>(&sql)
        .bind(standard)
        .bind(subject)
        .bind(limit.min(1000))
        .fetch_all(pool)
        .await?;

    Ok(records)
}

/// Per-standard aggregate statistics
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComplianceStatistics {
    pub total_checks: i64,
    pub compliant_checks: i64,
    pub non_compliant_checks: i64,
    pub average_score: Option<f64>,
}

pub async fn statistics(pool: &PgPool, standard: &str) -> Result<ComplianceStatistics> {
    let stats = sqlx::query_as::<_, ComplianceStatistics>(
        r#"
        SELECT
            COUNT(*) AS total_checks,
            COUNT(*) FILTER (WHERE compliant) AS compliant_checks,
            COUNT(*) FILTER (WHERE NOT compliant) AS non_compliant_checks,
            AVG(score) AS average_score
        FROM compliance_records
        WHERE standard = $1
        "#,
    )
    .bind(standard)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
