use crate::config::DeliveryConfig;
use crate::db::deliveries::{self, DeliveryStatistics};
use crate::db::schema::{DeliveryStatus, ServiceDeliveryRecord};
use crate::delivery::types::{
    retry_backoff, DeliveryOutcome, DeliveryRequest, NewDeliveryRecord,
};
use crate::errors::{GatewayError, Result};
use crate::gateway::{GatewayClient, GatewayRequest};
use crate::observability::MetricsRecorder;
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the lifecycle of every outbound delivery transaction: creation,
/// retry scheduling, confirmation, reconciliation and duplicate detection.
///
/// All state changes go through version-checked transitions in the
/// deliveries query module, so a live `submit` and a background sweep can
/// race on the same record without double-processing it.
pub struct DeliveryTracker {
    pool: PgPool,
    gateway: Arc<GatewayClient>,
    config: DeliveryConfig,
    retry_sweep_guard: Mutex<()>,
    reconciliation_sweep_guard: Mutex<()>,
}

impl DeliveryTracker {
    pub fn new(pool: PgPool, gateway: Arc<GatewayClient>, config: DeliveryConfig) -> Self {
        Self {
            pool,
            gateway,
            config,
            retry_sweep_guard: Mutex::new(()),
            reconciliation_sweep_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Submit a delivery. At most one non-duplicate record exists for any
    /// logical transaction inside the duplicate window: a matching earlier
    /// record short-circuits the submission and nothing is re-delivered.
    pub async fn submit(&self, request: DeliveryRequest) -> Result<DeliveryOutcome> {
        request.validate()?;

        tracing::info!(
            beneficiary = %request.beneficiary_id,
            program = %request.program_code,
            service_type = %request.service_type,
            target_system = %request.target_system,
            "Submitting service delivery"
        );

        let window_start = Utc::now() - Duration::hours(self.config.duplicate_window_hours);
        let dedupe_hash = request.dedupe_hash();

        if let Some(original) = deliveries::find_duplicate(
            &self.pool,
            request.external_reference.as_deref(),
            &dedupe_hash,
            window_start,
        )
        .await?
        {
            tracing::warn!(
                original_transaction = %original.transaction_id,
                beneficiary = %request.beneficiary_id,
                "Duplicate delivery detected, not re-delivering"
            );

            let shadow = NewDeliveryRecord::duplicate_of(&request, &original);
            let duplicate = deliveries::insert(&self.pool, &shadow).await?;
            MetricsRecorder::record_delivery_submission("DUPLICATE");

            return Ok(DeliveryOutcome::Duplicate {
                original,
                duplicate_record_id: duplicate.id,
            });
        }

        let record =
            deliveries::insert(&self.pool, &NewDeliveryRecord::from_request(&request)).await?;

        self.attempt(record, request.retry_on_failure).await
    }

    /// Drive one delivery attempt for a PENDING record and apply the
    /// resulting transition. Shared by live submissions and the retry sweep.
    pub(crate) async fn attempt(
        &self,
        record: ServiceDeliveryRecord,
        retry_on_failure: bool,
    ) -> Result<DeliveryOutcome> {
        debug_assert_eq!(record.status, DeliveryStatus::Pending.as_str());

        let gateway_request = self.build_gateway_request(&record, retry_on_failure);

        let envelope = match self.gateway.execute(gateway_request).await {
            Ok(envelope) => envelope,
            Err(e) => return self.handle_dispatch_error(record, retry_on_failure, e).await,
        };

        if envelope.success {
            let external_id = extract_external_transaction_id(envelope.body.as_ref());
            let updated = deliveries::mark_delivered(
                &self.pool,
                record.id,
                record.version,
                external_id.as_deref(),
            )
            .await?
            .ok_or_else(|| concurrent_update(&record))?;

            tracing::info!(
                transaction = %updated.transaction_id,
                external_transaction = ?updated.external_transaction_id,
                "Delivery accepted by partner system"
            );
            MetricsRecorder::record_delivery_submission("DELIVERED");

            return Ok(DeliveryOutcome::Delivered { record: updated });
        }

        let reason = envelope
            .error_message
            .clone()
            .unwrap_or_else(|| "Delivery rejected by partner system".to_string());
        let retryable = retry_on_failure && envelope.is_retryable_failure();

        self.fail_record(record, &reason, retryable).await
    }

    /// Config-level dispatch failures: the call never left the gateway.
    /// A locally exhausted rate window is retryable; an unknown or disabled
    /// system is an operator problem and surfaces to the caller.
    async fn handle_dispatch_error(
        &self,
        record: ServiceDeliveryRecord,
        retry_on_failure: bool,
        error: GatewayError,
    ) -> Result<DeliveryOutcome> {
        let retryable = retry_on_failure && error.is_retryable();
        let outcome = self.fail_record(record, &error.to_string(), retryable).await?;

        match error {
            GatewayError::SystemNotFound(_) | GatewayError::SystemDisabled(_) => Err(error),
            _ => Ok(outcome),
        }
    }

    async fn fail_record(
        &self,
        record: ServiceDeliveryRecord,
        reason: &str,
        retryable: bool,
    ) -> Result<DeliveryOutcome> {
        let retries_left = (record.retry_count as u32) < self.config.max_retries;
        let next_retry_at = if retryable && retries_left {
            Some(
                Utc::now()
                    + retry_backoff(
                        record.retry_count as u32,
                        self.config.retry_backoff_base_seconds,
                        self.config.retry_backoff_cap_seconds,
                    ),
            )
        } else {
            None
        };

        let updated =
            deliveries::mark_failed(&self.pool, record.id, record.version, reason, next_retry_at)
                .await?
                .ok_or_else(|| concurrent_update(&record))?;

        if let Some(next_retry_at) = next_retry_at {
            tracing::warn!(
                transaction = %updated.transaction_id,
                retry_count = %updated.retry_count,
                next_retry_at = %next_retry_at,
                reason = %reason,
                "Delivery failed, scheduled for retry"
            );
            MetricsRecorder::record_delivery_submission("FAILED_RETRYABLE");
            Ok(DeliveryOutcome::QueuedForRetry { record: updated })
        } else {
            if retryable && !retries_left {
                tracing::error!(
                    transaction = %updated.transaction_id,
                    retry_count = %updated.retry_count,
                    "Delivery exhausted retries, operator attention required"
                );
                MetricsRecorder::record_retries_exhausted();
            } else {
                tracing::warn!(
                    transaction = %updated.transaction_id,
                    reason = %reason,
                    "Delivery failed permanently"
                );
            }
            MetricsRecorder::record_delivery_submission("FAILED_PERMANENT");
            Ok(DeliveryOutcome::FailedPermanently { record: updated })
        }
    }

    /// Partner acknowledgment: DELIVERED -> CONFIRMED
    pub async fn confirm(
        &self,
        transaction_id: &str,
        confirmed_by: &str,
        verification_method: Option<&str>,
    ) -> Result<ServiceDeliveryRecord> {
        let record = self.get(transaction_id).await?;

        if record.status != DeliveryStatus::Delivered.as_str() {
            return Err(GatewayError::InvalidTransition(format!(
                "Cannot confirm transaction {} in state {}",
                transaction_id, record.status
            )));
        }

        let confirmed = deliveries::confirm(
            &self.pool,
            record.id,
            record.version,
            confirmed_by,
            verification_method,
        )
        .await?
        .ok_or_else(|| concurrent_update(&record))?;

        tracing::info!(
            transaction = %confirmed.transaction_id,
            confirmed_by = %confirmed_by,
            "Delivery confirmed"
        );

        Ok(confirmed)
    }

    /// Reconciliation verdict from matching against partner statements.
    /// A match closes the record as RECONCILED; a mismatch keeps it flagged
    /// for operators.
    pub async fn record_reconciliation_outcome(
        &self,
        transaction_id: &str,
        matched: bool,
    ) -> Result<ServiceDeliveryRecord> {
        let record = self.get(transaction_id).await?;

        if record.status != DeliveryStatus::Delivered.as_str() {
            return Err(GatewayError::InvalidTransition(format!(
                "Cannot reconcile transaction {} in state {}",
                transaction_id, record.status
            )));
        }

        let updated =
            deliveries::record_reconciliation(&self.pool, record.id, record.version, matched)
                .await?
                .ok_or_else(|| concurrent_update(&record))?;

        if matched {
            tracing::info!(transaction = %transaction_id, "Delivery reconciled");
        } else {
            tracing::error!(
                transaction = %transaction_id,
                "Reconciliation mismatch, operator attention required"
            );
            MetricsRecorder::record_reconciliation_mismatch();
        }

        Ok(updated)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<ServiceDeliveryRecord> {
        deliveries::get_by_transaction_id(&self.pool, transaction_id)
            .await?
            .ok_or_else(|| GatewayError::RecordNotFound(transaction_id.to_string()))
    }

    pub async fn list(
        &self,
        status: Option<&str>,
        beneficiary_id: Option<&str>,
        program_code: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ServiceDeliveryRecord>> {
        deliveries::list(
            &self.pool,
            status,
            beneficiary_id,
            program_code,
            limit,
            offset,
        )
        .await
    }

    /// Records needing operator attention
    pub async fn stuck_records(&self) -> Result<Vec<ServiceDeliveryRecord>> {
        deliveries::stuck_records(&self.pool, self.config.max_retries as i32).await
    }

    pub async fn statistics(&self) -> Result<DeliveryStatistics> {
        deliveries::statistics(&self.pool, self.config.max_retries as i32).await
    }

    // ========================================================================
    // Background sweeps
    // ========================================================================

    /// Re-attempt all FAILED records whose backoff has elapsed. Records are
    /// processed independently; one record's failure never aborts the sweep.
    /// At most one retry sweep runs at a time.
    pub async fn retry_sweep(&self) -> Result<RetrySweepReport> {
        let Ok(_guard) = self.retry_sweep_guard.try_lock() else {
            tracing::debug!("Retry sweep already in flight, skipping");
            return Ok(RetrySweepReport::skipped());
        };

        let due = deliveries::due_for_retry(
            &self.pool,
            self.config.max_retries as i32,
            Utc::now(),
            500,
        )
        .await?;

        let mut report = RetrySweepReport::default();
        report.examined = due.len();

        for record in due {
            let transaction_id = record.transaction_id.clone();

            let requeued = match deliveries::requeue_for_retry(
                &self.pool,
                record.id,
                record.version,
                self.config.max_retries as i32,
            )
            .await
            {
                Ok(Some(requeued)) => requeued,
                Ok(None) => {
                    // A live caller or another transition got there first
                    tracing::debug!(transaction = %transaction_id, "Record changed under the sweep, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::error!(transaction = %transaction_id, error = %e, "Failed to requeue record");
                    report.errors += 1;
                    continue;
                }
            };

            tracing::info!(
                transaction = %transaction_id,
                retry_count = %requeued.retry_count,
                "Retrying delivery"
            );
            MetricsRecorder::record_delivery_retry();

            match self.attempt(requeued, true).await {
                Ok(DeliveryOutcome::Delivered { .. }) => report.delivered += 1,
                Ok(DeliveryOutcome::QueuedForRetry { .. }) => report.rescheduled += 1,
                Ok(DeliveryOutcome::FailedPermanently { .. }) => report.exhausted += 1,
                Ok(DeliveryOutcome::Duplicate { .. }) => {
                    // attempt() never produces this; keep the arm for totality
                }
                Err(e) => {
                    tracing::error!(transaction = %transaction_id, error = %e, "Retry attempt errored");
                    report.errors += 1;
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = %report.examined,
                delivered = %report.delivered,
                rescheduled = %report.rescheduled,
                exhausted = %report.exhausted,
                errors = %report.errors,
                "Retry sweep completed"
            );
        }

        Ok(report)
    }

    /// Flag DELIVERED records with no confirmation past the threshold for
    /// manual reconciliation. At most one reconciliation sweep runs at a time.
    pub async fn reconciliation_sweep(&self) -> Result<u64> {
        let Ok(_guard) = self.reconciliation_sweep_guard.try_lock() else {
            tracing::debug!("Reconciliation sweep already in flight, skipping");
            return Ok(0);
        };

        let threshold = Utc::now() - Duration::hours(self.config.reconciliation_threshold_hours);
        let flagged =
            deliveries::flag_unconfirmed_for_reconciliation(&self.pool, threshold).await?;

        if flagged > 0 {
            tracing::warn!(
                flagged = %flagged,
                threshold_hours = %self.config.reconciliation_threshold_hours,
                "Flagged unconfirmed deliveries for reconciliation"
            );
            MetricsRecorder::record_reconciliation_flagged(flagged);
        }

        Ok(flagged)
    }

    fn build_gateway_request(
        &self,
        record: &ServiceDeliveryRecord,
        retry_on_failure: bool,
    ) -> GatewayRequest {
        let mut request = GatewayRequest::new(
            record.target_system.clone(),
            "POST",
            self.config.submission_path.clone(),
        )
        .with_body(json!({
            "transactionId": record.transaction_id,
            "beneficiaryId": record.beneficiary_id,
            "householdId": record.household_id,
            "programCode": record.program_code,
            "providingAgency": record.providing_agency,
            "serviceType": record.service_type,
            "deliveryMethod": record.delivery_method,
            "amount": record.amount.as_ref().map(|a| a.to_string()),
        }))
        .with_correlation_id(record.transaction_id.clone());

        request.retry_on_failure = retry_on_failure;
        request
    }
}

fn concurrent_update(record: &ServiceDeliveryRecord) -> GatewayError {
    GatewayError::InvalidTransition(format!(
        "Record {} was modified concurrently",
        record.transaction_id
    ))
}

/// Extract the partner-assigned transaction ID from a response body
fn extract_external_transaction_id(body: Option<&serde_json::Value>) -> Option<String> {
    let body = body?;

    for key in ["externalTransactionId", "transactionId", "referenceNumber"] {
        if let Some(value) = body.get(key).and_then(|v| v.as_str()) {
            return Some(value.to_string());
        }
    }

    None
}

/// Outcome summary of one retry sweep
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RetrySweepReport {
    pub examined: usize,
    pub delivered: usize,
    pub rescheduled: usize,
    pub exhausted: usize,
    pub errors: usize,
    pub skipped: bool,
}

impl RetrySweepReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_external_transaction_id() {
        let body = json!({"transactionId": "EXT-1"});
        assert_eq!(
            extract_external_transaction_id(Some(&body)),
            Some("EXT-1".to_string())
        );

        let body = json!({"externalTransactionId": "EXT-2", "transactionId": "EXT-3"});
        assert_eq!(
            extract_external_transaction_id(Some(&body)),
            Some("EXT-2".to_string())
        );

        let body = json!({"referenceNumber": "REF-9"});
        assert_eq!(
            extract_external_transaction_id(Some(&body)),
            Some("REF-9".to_string())
        );

        assert_eq!(extract_external_transaction_id(None), None);
        assert_eq!(
            extract_external_transaction_id(Some(&json!({"status": "ok"}))),
            None
        );
        // Non-string values are not references
        assert_eq!(
            extract_external_transaction_id(Some(&json!({"transactionId": 42}))),
            None
        );
    }
}
