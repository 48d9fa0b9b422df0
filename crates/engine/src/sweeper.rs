//! Shared pieces of the periodic sweeps.

use chrono::{DateTime, Utc};
use serde::Serialize;

use herald_common::error::AppError;
use herald_common::types::{DeliveryRecord, DeliveryStatus};

use crate::channel::Attempt;
use crate::dispatch::DispatchEngine;

/// Tally of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records matched by the selection query.
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
    pub retrying: usize,
    /// Records another processor claimed first.
    pub skipped: usize,
    /// Records whose processing hit a store error.
    pub errors: usize,
}

impl SweepReport {
    pub(crate) fn tally(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Sent => self.sent += 1,
            DeliveryStatus::Retry => self.retrying += 1,
            DeliveryStatus::Failed | DeliveryStatus::Pending => self.failed += 1,
        }
    }
}

/// Take the sweeper lease on `candidate`. `None` means another processor holds it.
pub(crate) async fn claim(
    engine: &DispatchEngine,
    candidate: &DeliveryRecord,
) -> Result<Option<DeliveryRecord>, AppError> {
    let lease = chrono::Duration::from_std(engine.config().claim_lease)
        .map_err(|e| AppError::Config(format!("claim lease out of range: {}", e)))?;
    let lease_until = engine
        .clock()
        .now()
        .checked_add_signed(lease)
        .ok_or_else(|| AppError::Config("claim lease out of range".to_string()))?;

    let claimed = engine
        .store()
        .claim(candidate.id, candidate.version, lease_until)
        .await?;

    if claimed.is_none() {
        tracing::debug!(record_id = %candidate.id, "Record claimed by another processor");
    }
    Ok(claimed)
}

/// Send a stored record again. A guardian that vanished or went inactive
/// counts as a failed attempt rather than an error.
pub(crate) async fn resend(engine: &DispatchEngine, record: &DeliveryRecord) -> Attempt {
    match engine.eligible_guardian(record.guardian_id).await {
        Ok(guardian) => engine.attempt(&guardian, record).await,
        Err(e) => {
            tracing::warn!(record_id = %record.id, error = %e, "Guardian unavailable for resend");
            Attempt::failed(e.to_string())
        }
    }
}

/// Transition a record after a retry-sweep attempt.
///
/// Every attempt counts. A failure that uses up the last attempt is terminal.
pub(crate) fn apply_retry_attempt(
    record: &mut DeliveryRecord,
    attempt: &Attempt,
    max_retry_attempts: i32,
    now: DateTime<Utc>,
) {
    record.retry_count += 1;
    if attempt.delivered {
        record.status = DeliveryStatus::Sent;
        record.sent_at = Some(now);
        record.external_message_id = attempt.external_id.clone();
        record.error_message = None;
    } else if record.retry_count >= max_retry_attempts {
        record.status = DeliveryStatus::Failed;
        record.error_message = Some(format!(
            "exhausted {} attempts: {}",
            max_retry_attempts,
            attempt.failure_reason()
        ));
    } else {
        record.status = DeliveryStatus::Retry;
        record.error_message = Some(attempt.failure_reason());
    }
    record.updated_at = now;
}
