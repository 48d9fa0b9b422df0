//! Retry sweep: re-drives failed deliveries after a cooldown.

use std::sync::Arc;

use async_trait::async_trait;

use herald_common::config::RetryEligibility;
use herald_common::error::AppError;
use herald_common::types::{DeliveryRecord, DeliveryStatus};

use crate::dispatch::DispatchEngine;
use crate::scheduler::Job;
use crate::sweeper::{self, SweepReport};

pub struct RetrySweeper {
    engine: Arc<DispatchEngine>,
}

impl RetrySweeper {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    /// Under `FailedOnly` a record that reaches Retry is never selected again
    /// and stays in Retry.
    fn eligible_statuses(&self) -> &'static [DeliveryStatus] {
        match self.engine.config().retry_eligibility {
            RetryEligibility::FailedAndRetry => &[DeliveryStatus::Failed, DeliveryStatus::Retry],
            RetryEligibility::FailedOnly => &[DeliveryStatus::Failed],
        }
    }

    /// One pass over every record that is due for another attempt.
    ///
    /// A record is due when its status is eligible, it has attempts left, and
    /// it was last touched at least one cooldown ago.
    pub async fn run(&self) -> Result<SweepReport, AppError> {
        let config = self.engine.config();
        let now = self.engine.clock().now();
        let cooldown = chrono::Duration::from_std(config.retry_cooldown)
            .map_err(|e| AppError::Config(format!("retry cooldown out of range: {}", e)))?;

        let updated_before = now
            .checked_sub_signed(cooldown)
            .ok_or_else(|| AppError::Config("retry cooldown out of range".to_string()))?;

        let candidates = self
            .engine
            .store()
            .find_retry_candidates(
                self.eligible_statuses(),
                config.max_retry_attempts,
                updated_before,
                now,
            )
            .await?;

        let mut report = SweepReport {
            selected: candidates.len(),
            ..SweepReport::default()
        };

        for candidate in candidates {
            match self.retry_one(&candidate).await {
                Ok(Some(status)) => report.tally(status),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(record_id = %candidate.id, error = %e, "Retry failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            selected = report.selected,
            sent = report.sent,
            retrying = report.retrying,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Retry sweep finished"
        );

        Ok(report)
    }

    async fn retry_one(
        &self,
        candidate: &DeliveryRecord,
    ) -> Result<Option<DeliveryStatus>, AppError> {
        let Some(mut record) = sweeper::claim(&self.engine, candidate).await? else {
            return Ok(None);
        };

        let attempt = sweeper::resend(&self.engine, &record).await;
        sweeper::apply_retry_attempt(
            &mut record,
            &attempt,
            self.engine.config().max_retry_attempts,
            self.engine.clock().now(),
        );
        let record = self.engine.store().save(&record).await?;

        tracing::debug!(
            record_id = %record.id,
            retry_count = record.retry_count,
            status = %record.status,
            "Record retried"
        );

        Ok(Some(record.status))
    }
}

#[async_trait]
impl Job for RetrySweeper {
    fn name(&self) -> &str {
        "retry-sweep"
    }

    async fn run(&self) -> anyhow::Result<()> {
        RetrySweeper::run(self).await?;
        Ok(())
    }
}
