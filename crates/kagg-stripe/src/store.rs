//! Pending Session Storage
//!
//! The short-lived key-value store is a capability the host provides: any
//! backend with `put`/`get` and expiry satisfies [`TransientStore`]. An
//! in-memory implementation is included for single-process deployments.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::client::{FormBody, ProviderSession};
use crate::error::StoreError;

pub const PENDING_SESSION_PREFIX: &str = "pending_session_";
pub const PENDING_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Key-value storage with per-entry expiry
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Store `value` under `key` for `ttl`
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError>;

    /// Value under `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
}

/// A checkout session created but not yet returned from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingSessionRecord {
    /// Body exactly as sent to the provider
    pub request_body: FormBody,

    /// Provider response
    pub session: ProviderSession,
}

impl PendingSessionRecord {
    pub fn key(session_id: &str) -> String {
        format!("{PENDING_SESSION_PREFIX}{session_id}")
    }
}

/// Typed access to pending-session records
pub struct PendingSessions<'a> {
    store: &'a dyn TransientStore,
}

impl<'a> PendingSessions<'a> {
    pub fn new(store: &'a dyn TransientStore) -> Self {
        Self { store }
    }

    pub async fn save(&self, record: &PendingSessionRecord) -> Result<(), StoreError> {
        let key = PendingSessionRecord::key(&record.session.id);
        self.store
            .put(&key, serde_json::to_value(record)?, PENDING_SESSION_TTL)
            .await
    }

    /// Record for `session_id`; an empty id never matches
    pub async fn find(&self, session_id: &str) -> Result<Option<PendingSessionRecord>, StoreError> {
        if session_id.is_empty() {
            return Ok(None);
        }
        match self.store.get(&PendingSessionRecord::key(session_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-memory transient store (single process)
#[derive(Default)]
pub struct MemoryTransientStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::Backend(e.to_string()))?;
        let now = Utc::now();

        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(e) if e.expires_at > now => return Ok(Some(e.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }

        self.entries.write().await.remove(key);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> PendingSessionRecord {
        let mut body = FormBody::new();
        body.push("mode", "payment");
        PendingSessionRecord {
            request_body: body,
            session: ProviderSession {
                id: id.into(),
                url: "https://checkout.stripe.com/x".into(),
                raw: json!({"id": id}),
            },
        }
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(PendingSessionRecord::key("cs_123"), "pending_session_cs_123");
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = MemoryTransientStore::new();
        let pending = PendingSessions::new(&store);
        pending.save(&record("cs_123")).await.unwrap();

        let found = pending.find("cs_123").await.unwrap().unwrap();
        assert_eq!(found, record("cs_123"));
        assert!(pending.find("cs_999").await.unwrap().is_none());
        assert!(pending.find("").await.unwrap().is_none());
        assert!(store.get("pending_session_cs_123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryTransientStore::new();
        store
            .put("short", json!(1), Duration::from_millis(20))
            .await
            .unwrap();
        store
            .put("long", json!(2), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.get("long").await.unwrap(), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }
}
