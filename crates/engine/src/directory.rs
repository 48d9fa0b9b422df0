//! Contact directory: read access to guardian contact data.
//!
//! The engine only reads through this trait. `insert` exists for seeding and
//! for the directory management surface, which may reject duplicate contacts.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Channel, Guardian};

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Guardian>, AppError>;

    async fn list_active(&self) -> Result<Vec<Guardian>, AppError>;

    async fn count_active(&self) -> Result<i64, AppError>;

    async fn count_by_preferred_channel(&self) -> Result<BTreeMap<Channel, i64>, AppError>;

    /// Add a guardian. Duplicate email or messaging handle yields `Conflict`.
    async fn insert(&self, guardian: &Guardian) -> Result<(), AppError>;
}

/// Directory held in process memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    guardians: RwLock<HashMap<Uuid, Guardian>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactDirectory for InMemoryDirectory {
    async fn get(&self, id: Uuid) -> Result<Option<Guardian>, AppError> {
        Ok(self.guardians.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Guardian>, AppError> {
        let guardians = self.guardians.read().await;
        let mut active: Vec<Guardian> = guardians.values().filter(|g| g.active).cloned().collect();
        active.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(active)
    }

    async fn count_active(&self) -> Result<i64, AppError> {
        let guardians = self.guardians.read().await;
        Ok(guardians.values().filter(|g| g.active).count() as i64)
    }

    async fn count_by_preferred_channel(&self) -> Result<BTreeMap<Channel, i64>, AppError> {
        let guardians = self.guardians.read().await;
        let mut counts = BTreeMap::new();
        for guardian in guardians.values() {
            *counts.entry(guardian.preferred_channel).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert(&self, guardian: &Guardian) -> Result<(), AppError> {
        let mut guardians = self.guardians.write().await;

        let others = || guardians.values().filter(|other| other.id != guardian.id);

        let email_taken = guardian
            .email
            .as_deref()
            .is_some_and(|email| others().any(|o| o.email.as_deref() == Some(email)));
        if email_taken {
            return Err(AppError::Conflict(
                "a guardian with this email already exists".to_string(),
            ));
        }

        let handle_taken = guardian
            .messaging_handle
            .as_deref()
            .is_some_and(|handle| others().any(|o| o.messaging_handle.as_deref() == Some(handle)));
        if handle_taken {
            return Err(AppError::Conflict(
                "a guardian with this messaging handle already exists".to_string(),
            ));
        }

        guardians.insert(guardian.id, guardian.clone());
        Ok(())
    }
}

/// Directory backed by the `guardians` table.
pub struct PgContactDirectory {
    pool: PgPool,
}

impl PgContactDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactDirectory for PgContactDirectory {
    async fn get(&self, id: Uuid) -> Result<Option<Guardian>, AppError> {
        let guardian = sqlx::query_as("SELECT * FROM guardians WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(guardian)
    }

    async fn list_active(&self) -> Result<Vec<Guardian>, AppError> {
        let guardians =
            sqlx::query_as("SELECT * FROM guardians WHERE active = true ORDER BY full_name")
                .fetch_all(&self.pool)
                .await?;
        Ok(guardians)
    }

    async fn count_active(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM guardians WHERE active = true")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_by_preferred_channel(&self) -> Result<BTreeMap<Channel, i64>, AppError> {
        let rows: Vec<(Channel, i64)> = sqlx::query_as(
            "SELECT preferred_channel, COUNT(*) FROM guardians GROUP BY preferred_channel",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert(&self, guardian: &Guardian) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO guardians (id, full_name, email, messaging_handle, preferred_channel, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(guardian.id)
        .bind(&guardian.full_name)
        .bind(&guardian.email)
        .bind(&guardian.messaging_handle)
        .bind(guardian.preferred_channel.to_string())
        .bind(guardian.active)
        .bind(guardian.created_at)
        .bind(guardian.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(guardian_id = %guardian.id, "Guardian created");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::Conflict(
                "a guardian with this email or messaging handle already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
