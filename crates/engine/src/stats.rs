//! Delivery statistics and the periodic status report.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use herald_common::error::AppError;
use herald_common::types::{Channel, DeliveryStatus, NotificationKind};

use crate::directory::ContactDirectory;
use crate::scheduler::Job;
use crate::store::DeliveryRecordStore;

/// Point-in-time counts over the record store and the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryStatistics {
    pub by_status: BTreeMap<DeliveryStatus, i64>,
    pub by_kind: BTreeMap<NotificationKind, i64>,
    pub total: i64,
    pub active_guardians: i64,
    pub guardians_by_channel: BTreeMap<Channel, i64>,
}

impl DeliveryStatistics {
    pub fn count(&self, status: DeliveryStatus) -> i64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

pub struct StatisticsAggregator {
    store: Arc<dyn DeliveryRecordStore>,
    directory: Arc<dyn ContactDirectory>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn DeliveryRecordStore>, directory: Arc<dyn ContactDirectory>) -> Self {
        Self { store, directory }
    }

    /// Every status and every kind appears in its map, zero when no record has it.
    pub async fn collect(&self) -> Result<DeliveryStatistics, AppError> {
        let mut by_status = self.store.count_by_status().await?;
        for status in DeliveryStatus::ALL {
            by_status.entry(status).or_insert(0);
        }

        let mut by_kind = self.store.count_by_kind().await?;
        for kind in NotificationKind::ALL {
            by_kind.entry(kind).or_insert(0);
        }

        Ok(DeliveryStatistics {
            by_status,
            by_kind,
            total: self.store.count().await?,
            active_guardians: self.directory.count_active().await?,
            guardians_by_channel: self.directory.count_by_preferred_channel().await?,
        })
    }
}

/// Logs the per-status counts on a schedule.
pub struct StatusReportJob {
    aggregator: StatisticsAggregator,
}

impl StatusReportJob {
    pub fn new(aggregator: StatisticsAggregator) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl Job for StatusReportJob {
    fn name(&self) -> &str {
        "status-report"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let stats = self.aggregator.collect().await?;
        tracing::info!(
            total = stats.total,
            pending = stats.count(DeliveryStatus::Pending),
            sent = stats.count(DeliveryStatus::Sent),
            failed = stats.count(DeliveryStatus::Failed),
            retry = stats.count(DeliveryStatus::Retry),
            active_guardians = stats.active_guardians,
            "Delivery status report"
        );
        Ok(())
    }
}
