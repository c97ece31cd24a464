use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::store::CacheStore;
use crate::models::HeaderDescriptor;

/// A cached table: headers, rows and the time they were fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Epoch milliseconds; entries without one are never fresh
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub headers: Vec<HeaderDescriptor>,
    pub data: Vec<T>,
}

impl<T> CacheEntry<T> {
    pub fn new(headers: Vec<HeaderDescriptor>, data: Vec<T>) -> Self {
        Self {
            timestamp: Some(Utc::now().timestamp_millis()),
            headers,
            data,
        }
    }

    pub fn age(&self) -> Option<Duration> {
        self.timestamp
            .map(|ts| Duration::milliseconds(Utc::now().timestamp_millis() - ts))
    }

    /// Reusable iff `now - timestamp <= ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age().map(|age| age <= ttl).unwrap_or(false)
    }
}

/// JSON cache entries on top of a `CacheStore`.
/// Clone is cheap - the store is shared.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` when nothing is stored, `Err` when the stored value is unreadable
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        let contents = match self.store.get(key)? {
            Some(contents) => contents,
            None => return Ok(None),
        };

        // A stored JSON `null` counts as absent
        let entry: Option<CacheEntry<T>> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry: {}", key))?;

        debug!(key = key, present = entry.is_some(), "Loaded cache entry");
        Ok(entry)
    }

    pub fn save<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) -> Result<()> {
        let contents = serde_json::to_string(entry)?;
        self.store.set(key, &contents)
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }
}
