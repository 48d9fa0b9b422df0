//! Retention sweep: deletes records past the retention window.

use std::sync::Arc;

use async_trait::async_trait;

use herald_common::error::AppError;

use crate::dispatch::DispatchEngine;
use crate::scheduler::Job;

pub struct RetentionSweeper {
    engine: Arc<DispatchEngine>,
}

impl RetentionSweeper {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    /// Delete every record created more than `days_to_keep` days ago,
    /// whatever its status. Returns the number of records removed.
    pub async fn purge(&self, days_to_keep: i64) -> Result<u64, AppError> {
        if days_to_keep < 0 {
            return Err(AppError::Validation(
                "days_to_keep must not be negative".to_string(),
            ));
        }

        let window = chrono::Duration::try_days(days_to_keep)
            .ok_or_else(|| AppError::Validation("days_to_keep is too large".to_string()))?;
        let cutoff = self
            .engine
            .clock()
            .now()
            .checked_sub_signed(window)
            .ok_or_else(|| AppError::Validation("days_to_keep is too large".to_string()))?;

        let deleted = self.engine.store().delete_created_before(cutoff).await?;
        tracing::info!(deleted, days_to_keep, cutoff = %cutoff, "Old delivery records purged");

        Ok(deleted)
    }

    /// Purge with the configured retention window.
    pub async fn run(&self) -> Result<u64, AppError> {
        self.purge(self.engine.config().retention_days).await
    }
}

#[async_trait]
impl Job for RetentionSweeper {
    fn name(&self) -> &str {
        "retention-sweep"
    }

    async fn run(&self) -> anyhow::Result<()> {
        RetentionSweeper::run(self).await?;
        Ok(())
    }
}
