use crate::traits::{Clock, FeedCache};
use crate::types::{AggregatorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const RAW_NAMESPACE: &str = "raw";
pub const FORMATTED_NAMESPACE: &str = "formatted";
pub const RESOLVED_NAMESPACE: &str = "resolved";

pub fn raw_key(source_link: &str) -> String {
    format!("{}:{}", RAW_NAMESPACE, source_link)
}

pub fn formatted_key(source_link: &str) -> String {
    format!("{}:{}", FORMATTED_NAMESPACE, source_link)
}

/// Website a redirector entry URL was last resolved to.
pub fn resolved_key(entry_url: &str) -> String {
    format!("{}:{}", RESOLVED_NAMESPACE, entry_url)
}

/// Read and deserialize a JSON value. A value that no longer deserializes is
/// reported as an error so callers can fall back to a fresh fetch.
pub async fn load<T: DeserializeOwned>(cache: &dyn FeedCache, key: &str) -> Result<Option<T>> {
    match cache.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub async fn store<T: Serialize + ?Sized>(
    cache: &dyn FeedCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let json = serde_json::to_string(value)?;
    cache.set(key, json, ttl).await
}

/// One category's value inside a per-source record. Categories sharing a
/// source each get their own slot, stamped so a slot outlives neither its
/// TTL nor later writes by other categories.
#[derive(Debug, Serialize, Deserialize)]
struct ScopedSlot<T> {
    cached_at: DateTime<Utc>,
    value: T,
}

type ScopedRecord<T> = HashMap<Uuid, ScopedSlot<T>>;

fn slot_is_live(cached_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now < cached_at + ttl,
        Err(_) => true,
    }
}

/// Read `scope`'s slot of the record under `key`, if younger than `ttl`.
pub async fn load_scoped<T: DeserializeOwned>(
    cache: &dyn FeedCache,
    key: &str,
    scope: Uuid,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Option<T>> {
    let Some(mut record) = load::<ScopedRecord<T>>(cache, key).await? else {
        return Ok(None);
    };

    Ok(record
        .remove(&scope)
        .filter(|slot| slot_is_live(slot.cached_at, ttl, now))
        .map(|slot| slot.value))
}

/// Write `scope`'s slot, keeping the live slots of other scopes.
pub async fn store_scoped<T: Serialize>(
    cache: &dyn FeedCache,
    key: &str,
    scope: Uuid,
    value: &T,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut record = match load::<ScopedRecord<serde_json::Value>>(cache, key).await {
        Ok(record) => record.unwrap_or_default(),
        Err(AggregatorError::Serialization(e)) => {
            debug!("Replacing unreadable cache record {}: {}", key, e);
            HashMap::new()
        }
        Err(e) => return Err(e),
    };

    record.retain(|_, slot| slot_is_live(slot.cached_at, ttl, now));
    record.insert(
        scope,
        ScopedSlot {
            cached_at: now,
            value: serde_json::to_value(value)?,
        },
    );
    store(cache, key, &record, ttl).await
}

struct CacheSlot {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local cache. One lock guards the whole map, so every read or
/// write of a key sees a complete value.
pub struct MemoryCache {
    slots: RwLock<HashMap<String, CacheSlot>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        {
            let slots = self.slots.read().await;
            match slots.get(key) {
                None => return Ok(None),
                Some(slot) if now < slot.expires_at => return Ok(Some(slot.value.clone())),
                Some(_) => {}
            }
        }

        let mut slots = self.slots.write().await;
        // Re-check under the write lock; a fresh value may have landed meanwhile.
        match slots.get(key) {
            Some(slot) if now < slot.expires_at => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                debug!("Cache entry expired: {}", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AggregatorError::Cache(format!("Invalid TTL for {}: {}", key, e)))?;
        let expires_at = self.clock.now() + ttl;

        let mut slots = self.slots.write().await;
        slots.insert(key.to_string(), CacheSlot { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.write().await;
        if slots.remove(key).is_some() {
            debug!("Deleted cache entry: {}", key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut slots = self.slots.write().await;
        let count = slots.len();
        slots.clear();
        debug!("Cleared {} cache entries", count);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
