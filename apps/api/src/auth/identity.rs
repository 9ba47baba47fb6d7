//! Identity stores. Creation is idempotent per normalized email: concurrent first logins
//! for the same address converge on one record.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::storage::StoreError;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the identity for `email`, creating it with `now` as `created_at` if absent.
    /// Must be a single atomic step per email.
    async fn get_or_create(&self, email: &str, now: DateTime<Utc>)
        -> Result<Identity, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryIdentityStore {
    by_email: Mutex<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_email.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Identity>>, StoreError> {
        self.by_email
            .lock()
            .map_err(|_| StoreError::Backend("identity store lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_or_create(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, StoreError> {
        let mut by_email = self.lock()?;
        let identity = by_email
            .entry(email.to_string())
            .or_insert_with(|| Identity {
                id: Uuid::new_v4(),
                email: email.to_string(),
                created_at: now,
            });
        Ok(identity.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.lock()?.values().find(|i| i.id == id).cloned())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres store
// ────────────────────────────────────────────────────────────────────────────

/// Backed by the `identities` table created in `db::ensure_schema`.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn get_or_create(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (id, email, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(sqlx::query_as::<_, Identity>(
            "SELECT id, email, created_at FROM identities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = MemoryIdentityStore::new();
        let first = store.get_or_create("a@b.com", Utc::now()).await.unwrap();
        let second = store.get_or_create("a@b.com", Utc::now()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_distinct_emails_get_distinct_ids() {
        let store = MemoryIdentityStore::new();
        let a = store.get_or_create("a@b.com", Utc::now()).await.unwrap();
        let c = store.get_or_create("c@d.com", Utc::now()).await.unwrap();
        assert_ne!(a.id, c.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_yields_one_identity() {
        let store = Arc::new(MemoryIdentityStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.get_or_create("same@example.com", Utc::now()).await.unwrap()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
