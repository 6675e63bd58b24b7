//! Durable key-value store seam.
//!
//! All persistence in this service (user records, magic links, sessions, durable
//! rate-limit counters) goes through the [`KvStore`] trait: get/set/delete by
//! composite key with optional expiry. The store is treated as an opaque
//! collaborator; no component reads another's key namespace directly.
//!
//! [`MemoryKv`] is the in-process implementation used by default and in tests.
//! Entries carry their expiry and are reclaimed lazily on access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Key namespace prefixes. Each entity owner uses exactly one of these.
pub mod keys {
    pub const USER: &str = "user";
    pub const MAGIC_LINK: &str = "magic_link";
    pub const SESSION: &str = "session";
    pub const RATE_LIMIT: &str = "rate_limit";
}

#[derive(ThisError, Debug)]
pub enum KvError {
    #[error("store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow interface over the durable key-value store.
///
/// Keys are composite (`[namespace, identifier]`), values are JSON documents,
/// and `expire_in` asks the store to reclaim the entry after the given duration.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &[&str]) -> Result<Option<Value>, KvError>;

    async fn set(&self, key: &[&str], value: Value, expire_in: Option<Duration>) -> Result<(), KvError>;

    /// Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &[&str]) -> Result<(), KvError>;
}

/// Typed read: deserializes the stored JSON document into `T`.
pub async fn get_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &[&str]) -> Result<Option<T>, KvError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Typed write: serializes `value` before storing.
pub async fn set_typed<T: Serialize>(
    store: &dyn KvStore,
    key: &[&str],
    value: &T,
    expire_in: Option<Duration>,
) -> Result<(), KvError> {
    store.set(key, serde_json::to_value(value)?, expire_in).await
}

struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// In-process [`KvStore`] backed by a concurrent map.
///
/// Expired entries self-correct on the next access; no background sweep is
/// required for correctness.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn compose(key: &[&str]) -> String {
        key.join("\u{1f}")
    }

    /// Evict all expired entries. Cosmetic housekeeping only.
    pub fn sweep(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &[&str]) -> Result<Option<Value>, KvError> {
        let composed = Self::compose(key);
        let now = Utc::now();

        let expired = match self.entries.get(&composed) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };

        if expired {
            self.entries.remove(&composed);
        }
        Ok(None)
    }

    async fn set(&self, key: &[&str], value: Value, expire_in: Option<Duration>) -> Result<(), KvError> {
        let expires_at = expire_in.map(|ttl| Utc::now() + chrono::Duration::milliseconds(ttl.as_millis() as i64));
        self.entries.insert(Self::compose(key), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &[&str]) -> Result<(), KvError> {
        self.entries.remove(&Self::compose(key));
        Ok(())
    }
}
