//! Dispatch engine: resolves the channel, sends, and records the outcome.
//!
//! Steps for an immediate dispatch:
//! 1. Look up the guardian (not found / inactive are caller errors, no record)
//! 2. Validate content and contact for the effective channel
//! 3. Persist a Pending record
//! 4. Send over the channel route
//! 5. Persist Sent or Failed with a compare-and-swap write

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use herald_common::config::DeliveryConfig;
use herald_common::error::AppError;
use herald_common::types::{Channel, DeliveryRecord, DeliveryStatus, Guardian, NotificationKind};

use crate::channel::{Attempt, ChannelRouter};
use crate::clock::Clock;
use crate::directory::ContactDirectory;
use crate::store::DeliveryRecordStore;
use crate::validation;

/// What to send. The recipient is passed separately.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    /// Falls back to the guardian's preferred channel.
    #[serde(default)]
    pub channel: Option<Channel>,
    pub subject: String,
    pub body: String,
    /// Defer the send to the scheduled sweep.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    pub fn new(kind: NotificationKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            channel: None,
            subject: subject.into(),
            body: body.into(),
            scheduled_at: None,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

pub struct DispatchEngine {
    store: Arc<dyn DeliveryRecordStore>,
    directory: Arc<dyn ContactDirectory>,
    router: ChannelRouter,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DeliveryRecordStore>,
        directory: Arc<dyn ContactDirectory>,
        router: ChannelRouter,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            store,
            directory,
            router,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DeliveryRecordStore> {
        &self.store
    }

    pub fn directory(&self) -> &Arc<dyn ContactDirectory> {
        &self.directory
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Send one notification to one guardian.
    ///
    /// Gateway failures do not surface as errors: they come back as a record
    /// with status Failed. Errors are reserved for requests that never produced
    /// a record (unknown or inactive guardian, invalid content or contact).
    pub async fn dispatch(
        &self,
        guardian_id: Uuid,
        request: &NotificationRequest,
    ) -> Result<DeliveryRecord, AppError> {
        let guardian = self.eligible_guardian(guardian_id).await?;
        validation::validate_content(&request.subject, &request.body)?;
        self.dispatch_to(&guardian, request).await
    }

    /// Send the same notification to many guardians.
    ///
    /// The whole call is rejected up front when the id list is empty, too long,
    /// or has duplicates. Past that point each guardian is independent: unknown,
    /// inactive or unreachable guardians are skipped and logged, and a failed
    /// send is returned as a Failed record.
    pub async fn dispatch_bulk(
        &self,
        guardian_ids: &[Uuid],
        request: &NotificationRequest,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        validation::validate_bulk(guardian_ids, self.config.bulk_limit)?;
        validation::validate_content(&request.subject, &request.body)?;

        tracing::info!(count = guardian_ids.len(), kind = %request.kind, "Bulk dispatch started");

        let mut records = Vec::with_capacity(guardian_ids.len());
        for &guardian_id in guardian_ids {
            let guardian = match self.eligible_guardian(guardian_id).await {
                Ok(guardian) => guardian,
                Err(e) => {
                    tracing::warn!(guardian_id = %guardian_id, error = %e, "Skipping guardian");
                    continue;
                }
            };

            match self.dispatch_to(&guardian, request).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(guardian_id = %guardian_id, error = %e, "Skipping guardian");
                }
            }
        }

        tracing::info!(
            requested = guardian_ids.len(),
            produced = records.len(),
            "Bulk dispatch finished"
        );

        Ok(records)
    }

    async fn dispatch_to(
        &self,
        guardian: &Guardian,
        request: &NotificationRequest,
    ) -> Result<DeliveryRecord, AppError> {
        let channel = request.channel.unwrap_or(guardian.preferred_channel);
        validation::validate_contact(guardian, channel)?;

        let now = self.clock.now();
        let mut record = DeliveryRecord::pending(
            guardian.id,
            request.kind,
            channel,
            &request.subject,
            &request.body,
            now,
        );

        if let Some(at) = request.scheduled_at.filter(|at| *at > now) {
            record.scheduled_at = Some(at);
            self.store.insert(&record).await?;
            tracing::info!(
                record_id = %record.id,
                guardian_id = %guardian.id,
                scheduled_at = %at,
                "Notification scheduled"
            );
            return Ok(record);
        }

        self.store.insert(&record).await?;

        let attempt = self.attempt(guardian, &record).await;
        apply_first_attempt(&mut record, &attempt, self.clock.now());
        let record = self.store.save(&record).await?;

        tracing::info!(
            record_id = %record.id,
            guardian_id = %guardian.id,
            channel = %record.channel,
            status = %record.status,
            "Notification dispatched"
        );

        Ok(record)
    }

    /// Run the channel route for a record. Never fails; see `Attempt`.
    pub(crate) async fn attempt(&self, guardian: &Guardian, record: &DeliveryRecord) -> Attempt {
        self.router
            .route(record.channel)
            .deliver(guardian, &record.subject, &record.body)
            .await
    }

    /// The guardian, if it exists and is active.
    pub(crate) async fn eligible_guardian(&self, guardian_id: Uuid) -> Result<Guardian, AppError> {
        let guardian = self
            .directory
            .get(guardian_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Guardian {} not found", guardian_id)))?;

        if !guardian.active {
            return Err(AppError::Inactive(format!(
                "Guardian {} is inactive",
                guardian_id
            )));
        }

        Ok(guardian)
    }
}

/// Transition a Pending record after its first send attempt.
pub(crate) fn apply_first_attempt(
    record: &mut DeliveryRecord,
    attempt: &Attempt,
    now: DateTime<Utc>,
) {
    if attempt.delivered {
        record.status = DeliveryStatus::Sent;
        record.sent_at = Some(now);
        record.external_message_id = attempt.external_id.clone();
        record.error_message = None;
    } else {
        record.status = DeliveryStatus::Failed;
        record.error_message = Some(attempt.failure_reason());
    }
    record.updated_at = now;
}
