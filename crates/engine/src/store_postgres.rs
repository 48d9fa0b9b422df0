use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{DeliveryRecord, DeliveryStatus, NotificationKind};

use crate::store::DeliveryRecordStore;

/// Record store backed by the `delivery_records` table.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRecordStore for PgRecordStore {
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO delivery_records (
                id, guardian_id, kind, channel, subject, message, status,
                external_message_id, error_message, retry_count, scheduled_at,
                sent_at, created_at, updated_at, version, claimed_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.guardian_id)
        .bind(record.kind.to_string())
        .bind(record.channel.to_string())
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.status.to_string())
        .bind(&record.external_message_id)
        .bind(&record.error_message)
        .bind(record.retry_count)
        .bind(record.scheduled_at)
        .bind(record.sent_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.version)
        .bind(record.claimed_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryRecord>, AppError> {
        let record = sqlx::query_as("SELECT * FROM delivery_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn save(&self, record: &DeliveryRecord) -> Result<DeliveryRecord, AppError> {
        let saved: Option<DeliveryRecord> = sqlx::query_as(
            r#"
            UPDATE delivery_records
            SET status = $3,
                external_message_id = $4,
                error_message = $5,
                retry_count = $6,
                scheduled_at = $7,
                sent_at = $8,
                updated_at = $9,
                version = version + 1,
                claimed_until = NULL
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.version)
        .bind(record.status.to_string())
        .bind(&record.external_message_id)
        .bind(&record.error_message)
        .bind(record.retry_count)
        .bind(record.scheduled_at)
        .bind(record.sent_at)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match saved {
            Some(saved) => Ok(saved),
            None if self.get(record.id).await?.is_some() => Err(AppError::Conflict(format!(
                "delivery record {} was modified concurrently (expected version {})",
                record.id, record.version
            ))),
            None => Err(AppError::NotFound(format!(
                "delivery record {} not found",
                record.id
            ))),
        }
    }

    async fn claim(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<DeliveryRecord>, AppError> {
        let claimed = sqlx::query_as(
            r#"
            UPDATE delivery_records
            SET version = version + 1, claimed_until = $3
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed)
    }

    async fn find_retry_candidates(
        &self,
        statuses: &[DeliveryStatus],
        max_retry_attempts: i32,
        updated_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        let records = sqlx::query_as(
            r#"
            SELECT * FROM delivery_records
            WHERE status = ANY($1)
              AND retry_count < $2
              AND updated_at <= $3
              AND (claimed_until IS NULL OR claimed_until <= $4)
            ORDER BY updated_at
            "#,
        )
        .bind(&statuses)
        .bind(max_retry_attempts)
        .bind(updated_before)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = sqlx::query_as(
            r#"
            SELECT * FROM delivery_records
            WHERE status = $1
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= $2
              AND (claimed_until IS NULL OR claimed_until <= $2)
            ORDER BY scheduled_at
            "#,
        )
        .bind(DeliveryStatus::Pending.to_string())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_by_guardian(&self, guardian_id: Uuid) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = sqlx::query_as(
            "SELECT * FROM delivery_records WHERE guardian_id = $1 ORDER BY created_at DESC",
        )
        .bind(guardian_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM delivery_records WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> Result<BTreeMap<DeliveryStatus, i64>, AppError> {
        let rows: Vec<(DeliveryStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM delivery_records GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn count_by_kind(&self) -> Result<BTreeMap<NotificationKind, i64>, AppError> {
        let rows: Vec<(NotificationKind, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM delivery_records GROUP BY kind")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM delivery_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
