//! OTP records and their stores.
//!
//! Records are immutable once inserted. Single use rests on `delete` reporting `true`
//! to exactly one caller per handle: whoever removes the record owns the verification.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub handle: Uuid,
    /// Normalized address the code was sent to.
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError>;

    async fn get(&self, handle: Uuid) -> Result<Option<OtpRecord>, StoreError>;

    /// Removes the record. Returns `true` only for the call that actually removed it.
    async fn delete(&self, handle: Uuid) -> Result<bool, StoreError>;

    /// Drops every record expired at `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<Uuid, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, OtpRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("otp store lock poisoned".to_string()))
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.handle, record.clone());
        Ok(())
    }

    async fn get(&self, handle: Uuid) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self.lock()?.get(&handle).cloned())
    }

    async fn delete(&self, handle: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(&handle).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok(before - records.len())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis store
// ────────────────────────────────────────────────────────────────────────────

/// Records are JSON under `otp:{handle}` with a TTL matching their remaining lifetime.
#[derive(Clone)]
pub struct RedisOtpStore {
    conn: MultiplexedConnection,
}

impl RedisOtpStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, StoreError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn key(handle: Uuid) -> String {
        format!("otp:{handle}")
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn insert(&self, record: &OtpRecord) -> Result<(), StoreError> {
        let ttl = (record.expires_at - Utc::now()).num_seconds().max(1) as u64;
        let payload = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(record.handle), payload, ttl)
            .await?;
        Ok(())
    }

    async fn get(&self, handle: Uuid) -> Result<Option<OtpRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(handle)).await?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn delete(&self, handle: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(Self::key(handle)).await?;
        Ok(removed == 1)
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        // Redis expires keys on its own.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn record(expires_in: Duration) -> OtpRecord {
        OtpRecord {
            handle: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            code: "123456".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = MemoryOtpStore::new();
        let rec = record(Duration::minutes(10));
        store.insert(&rec).await.unwrap();

        assert_eq!(store.get(rec.handle).await.unwrap(), Some(rec.clone()));
        assert!(store.delete(rec.handle).await.unwrap());
        assert!(!store.delete(rec.handle).await.unwrap());
        assert!(store.get(rec.handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_keeps_live_records() {
        let store = MemoryOtpStore::new();
        let live = record(Duration::minutes(10));
        let stale = record(Duration::minutes(-1));
        store.insert(&live).await.unwrap();
        store.insert(&stale).await.unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(live.handle).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_delete_has_one_winner() {
        let store = Arc::new(MemoryOtpStore::new());
        let rec = record(Duration::minutes(10));
        store.insert(&rec).await.unwrap();
        let handle = rec.handle;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete(handle).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
