//! Scheduled sweep: performs the first attempt of deferred notifications.

use std::sync::Arc;

use async_trait::async_trait;

use herald_common::error::AppError;
use herald_common::types::{DeliveryRecord, DeliveryStatus};

use crate::dispatch::{DispatchEngine, apply_first_attempt};
use crate::scheduler::Job;
use crate::sweeper::{self, SweepReport};

pub struct ScheduledSweeper {
    engine: Arc<DispatchEngine>,
}

impl ScheduledSweeper {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    /// Send every Pending record whose scheduled time has passed.
    pub async fn run(&self) -> Result<SweepReport, AppError> {
        let now = self.engine.clock().now();
        let due = self.engine.store().find_due_scheduled(now).await?;

        let mut report = SweepReport {
            selected: due.len(),
            ..SweepReport::default()
        };

        for candidate in due {
            match self.send_one(&candidate).await {
                Ok(Some(status)) => report.tally(status),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(record_id = %candidate.id, error = %e, "Scheduled send failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            selected = report.selected,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Scheduled sweep finished"
        );

        Ok(report)
    }

    async fn send_one(
        &self,
        candidate: &DeliveryRecord,
    ) -> Result<Option<DeliveryStatus>, AppError> {
        let Some(mut record) = sweeper::claim(&self.engine, candidate).await? else {
            return Ok(None);
        };

        let attempt = sweeper::resend(&self.engine, &record).await;
        apply_first_attempt(&mut record, &attempt, self.engine.clock().now());
        let record = self.engine.store().save(&record).await?;

        tracing::info!(
            record_id = %record.id,
            guardian_id = %record.guardian_id,
            status = %record.status,
            "Scheduled notification processed"
        );

        Ok(Some(record.status))
    }
}

#[async_trait]
impl Job for ScheduledSweeper {
    fn name(&self) -> &str {
        "scheduled-sweep"
    }

    async fn run(&self) -> anyhow::Result<()> {
        ScheduledSweeper::run(self).await?;
        Ok(())
    }
}
