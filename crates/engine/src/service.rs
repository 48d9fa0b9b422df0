//! Entry point for callers: dispatch, lookups, manual sweeps and statistics.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use herald_common::config::AppConfig;
use herald_common::error::AppError;
use herald_common::types::{Channel, DeliveryRecord, NotificationKind};
use herald_notifier::{ResendMailer, WhatsAppWebGateway};

use crate::channel::ChannelRouter;
use crate::clock::SystemClock;
use crate::directory::PgContactDirectory;
use crate::dispatch::{DispatchEngine, NotificationRequest};
use crate::pool::{SweepPool, SweepTicket};
use crate::retention::RetentionSweeper;
use crate::retry::RetrySweeper;
use crate::scheduled::ScheduledSweeper;
use crate::scheduler::{JobSchedule, Scheduler};
use crate::stats::{DeliveryStatistics, StatisticsAggregator, StatusReportJob};
use crate::store_postgres::PgRecordStore;
use crate::sweeper::SweepReport;

pub struct NotificationService {
    engine: Arc<DispatchEngine>,
    retry: Arc<RetrySweeper>,
    scheduled: Arc<ScheduledSweeper>,
    retention: Arc<RetentionSweeper>,
    sweeps: SweepPool,
}

impl NotificationService {
    pub fn new(engine: DispatchEngine) -> Self {
        let engine = Arc::new(engine);
        let sweeps = SweepPool::new(engine.config().sweep_workers);
        Self {
            retry: Arc::new(RetrySweeper::new(engine.clone())),
            scheduled: Arc::new(ScheduledSweeper::new(engine.clone())),
            retention: Arc::new(RetentionSweeper::new(engine.clone())),
            sweeps,
            engine,
        }
    }

    /// Production wiring: Postgres store and directory, HTTP gateways, wall clock.
    pub fn postgres(pool: PgPool, config: &AppConfig) -> Self {
        let mail = ResendMailer::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
            config.gateway_timeout,
        );
        let messaging = WhatsAppWebGateway::new(
            config.whatsapp_api_url.clone(),
            config.whatsapp_enabled,
            config.gateway_timeout,
        );

        Self::new(DispatchEngine::new(
            Arc::new(PgRecordStore::new(pool.clone())),
            Arc::new(PgContactDirectory::new(pool)),
            ChannelRouter::new(Arc::new(mail), Arc::new(messaging)),
            Arc::new(SystemClock),
            config.delivery.clone(),
        ))
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    pub async fn dispatch(
        &self,
        guardian_id: Uuid,
        request: &NotificationRequest,
    ) -> Result<DeliveryRecord, AppError> {
        self.engine.dispatch(guardian_id, request).await
    }

    pub async fn dispatch_bulk(
        &self,
        guardian_ids: &[Uuid],
        request: &NotificationRequest,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        self.engine.dispatch_bulk(guardian_ids, request).await
    }

    /// Tell a guardian that a student's bulletin is ready.
    pub async fn send_bulletin(
        &self,
        guardian_id: Uuid,
        student_name: &str,
        period: &str,
        channel: Option<Channel>,
    ) -> Result<DeliveryRecord, AppError> {
        let mut request = NotificationRequest::new(
            NotificationKind::BulletinAvailable,
            format!("Bulletin for {} available - {}", student_name, period),
            format!(
                "The bulletin for {} for the period {} is now available.",
                student_name, period
            ),
        );
        request.channel = channel;
        self.engine.dispatch(guardian_id, &request).await
    }

    pub async fn get_status(&self, record_id: Uuid) -> Result<DeliveryRecord, AppError> {
        self.engine
            .store()
            .get(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", record_id)))
    }

    /// Newest first. Unknown guardians simply have no history.
    pub async fn get_history(&self, guardian_id: Uuid) -> Result<Vec<DeliveryRecord>, AppError> {
        self.engine.store().list_by_guardian(guardian_id).await
    }

    /// Start a retry sweep in the background and return without waiting for it.
    pub fn trigger_retry_sweep_now(&self) -> SweepTicket<SweepReport> {
        let retry = self.retry.clone();
        tracing::info!("Manual retry sweep requested");
        self.sweeps
            .submit("retry-sweep", async move { retry.run().await })
    }

    /// Run a scheduled sweep on the caller's task.
    pub async fn run_scheduled_sweep(&self) -> Result<SweepReport, AppError> {
        self.scheduled.run().await
    }

    /// Delete records older than `days_to_keep` days.
    pub async fn trigger_cleanup(&self, days_to_keep: i64) -> Result<u64, AppError> {
        self.retention.purge(days_to_keep).await
    }

    pub async fn get_statistics(&self) -> Result<DeliveryStatistics, AppError> {
        self.aggregator().collect().await
    }

    fn aggregator(&self) -> StatisticsAggregator {
        StatisticsAggregator::new(
            self.engine.store().clone(),
            self.engine.directory().clone(),
        )
    }

    /// The periodic jobs, configured from the delivery settings. Not started.
    pub fn scheduler(&self) -> Scheduler {
        let config = self.engine.config();
        Scheduler::new(self.engine.clock().clone())
            .add(
                self.retry.clone(),
                JobSchedule::Every(config.retry_interval),
            )
            .add(
                self.scheduled.clone(),
                JobSchedule::Every(config.scheduled_interval),
            )
            .add(
                self.retention.clone(),
                JobSchedule::DailyAt(config.cleanup_at),
            )
            .add(
                Arc::new(StatusReportJob::new(self.aggregator())),
                JobSchedule::Every(config.status_report_interval),
            )
    }
}
