//! Durable record of every dispatch attempt.
//!
//! Writes are optimistic: `save` and `claim` only succeed when the stored
//! `version` still matches the caller's copy, and bump it on success. Two
//! processors racing on one record therefore cannot both send it.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{DeliveryRecord, DeliveryStatus, NotificationKind};

#[async_trait]
pub trait DeliveryRecordStore: Send + Sync {
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryRecord>, AppError>;

    /// Compare-and-swap write. Returns the stored copy with its new version.
    ///
    /// Fails with `Conflict` when `record.version` is stale. The write also
    /// releases any claim on the record.
    async fn save(&self, record: &DeliveryRecord) -> Result<DeliveryRecord, AppError>;

    /// Take a lease on a record at `expected_version`.
    ///
    /// Returns `None` when another processor got there first.
    async fn claim(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<DeliveryRecord>, AppError>;

    /// Records in one of `statuses` with `retry_count < max_retry_attempts`,
    /// last updated at or before `updated_before`, and not currently claimed.
    async fn find_retry_candidates(
        &self,
        statuses: &[DeliveryStatus],
        max_retry_attempts: i32,
        updated_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>, AppError>;

    /// Pending records whose `scheduled_at` is at or before `now`, not claimed.
    async fn find_due_scheduled(&self, now: DateTime<Utc>)
    -> Result<Vec<DeliveryRecord>, AppError>;

    /// All records for a guardian, newest first.
    async fn list_by_guardian(&self, guardian_id: Uuid) -> Result<Vec<DeliveryRecord>, AppError>;

    /// Delete records created strictly before `cutoff`. Returns the number removed.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    async fn count_by_status(&self) -> Result<BTreeMap<DeliveryStatus, i64>, AppError>;

    async fn count_by_kind(&self) -> Result<BTreeMap<NotificationKind, i64>, AppError>;

    async fn count(&self) -> Result<i64, AppError>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Uuid, DeliveryRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryRecordStore for InMemoryRecordStore {
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(AppError::Conflict(format!(
                "delivery record {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &DeliveryRecord) -> Result<DeliveryRecord, AppError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or_else(|| AppError::NotFound(format!("delivery record {} not found", record.id)))?;

        if stored.version != record.version {
            return Err(AppError::Conflict(format!(
                "delivery record {} was modified concurrently (expected version {}, found {})",
                record.id, record.version, stored.version
            )));
        }

        let mut next = record.clone();
        next.version += 1;
        next.claimed_until = None;
        *stored = next.clone();
        Ok(next)
    }

    async fn claim(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<DeliveryRecord>, AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(stored) if stored.version == expected_version => {
                stored.version += 1;
                stored.claimed_until = Some(lease_until);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_retry_candidates(
        &self,
        statuses: &[DeliveryStatus],
        max_retry_attempts: i32,
        updated_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = self.records.read().await;
        let mut found: Vec<DeliveryRecord> = records
            .values()
            .filter(|r| statuses.contains(&r.status))
            .filter(|r| r.retry_count < max_retry_attempts)
            .filter(|r| r.updated_at <= updated_before)
            .filter(|r| !r.is_claimed(now))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.updated_at);
        Ok(found)
    }

    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = self.records.read().await;
        let mut found: Vec<DeliveryRecord> = records
            .values()
            .filter(|r| r.status == DeliveryStatus::Pending)
            .filter(|r| r.scheduled_at.is_some_and(|at| at <= now))
            .filter(|r| !r.is_claimed(now))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.scheduled_at);
        Ok(found)
    }

    async fn list_by_guardian(&self, guardian_id: Uuid) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = self.records.read().await;
        let mut found: Vec<DeliveryRecord> = records
            .values()
            .filter(|r| r.guardian_id == guardian_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.created_at >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn count_by_status(&self) -> Result<BTreeMap<DeliveryStatus, i64>, AppError> {
        let records = self.records.read().await;
        let mut counts = BTreeMap::new();
        for record in records.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_by_kind(&self) -> Result<BTreeMap<NotificationKind, i64>, AppError> {
        let records = self.records.read().await;
        let mut counts = BTreeMap::new();
        for record in records.values() {
            *counts.entry(record.kind).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.records.read().await.len() as i64)
    }
}
