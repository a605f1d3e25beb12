//! Cache stores and the cache-aside orchestrator.
//!
//! Two tiers implement [`CacheStore`]:
//! - [`MemoryCacheStore`]: process-local, self-expiring on read
//! - [`UpstashCacheStore`]: shared across processes through the Upstash REST API
//!   ([`RedisCacheStore`] speaks native Redis when the `redis` feature is on)
//!
//! Stores never return errors. A backend that is unconfigured reports
//! `Disabled`, a backend that fails logs and reports a miss or `Failed`, and
//! [`CacheAside`] falls through to the provider in both cases.

mod aside;
mod key;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod upstash;

pub use aside::{CacheAside, ValueOrigin};
pub use key::CacheKey;
pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis::RedisCacheStore;
pub use upstash::{UpstashCacheStore, UpstashConfig};

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Result of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    /// The store has no configuration; nothing was attempted.
    Disabled,
    /// The backend rejected or never received the write.
    Failed,
}

/// Result of a delete.
///
/// Deleting an absent key is a success reported as `NotFound`, distinct from
/// `Removed`, so repeated invalidation is safe and still informative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
    Disabled,
    Failed,
}

/// Key-value store with a per-entry time-to-live.
///
/// Values are opaque strings at this boundary; [`get_json`] and [`set_json`]
/// layer the serialization on top.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn backend(&self) -> &'static str;

    /// False when the store is running without configuration.
    fn is_enabled(&self) -> bool;

    /// True for an operative tier that other processes also read.
    fn is_shared(&self) -> bool {
        false
    }

    /// Read a live entry.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write an entry that lapses after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> SetOutcome;

    /// Remove an entry.
    async fn delete(&self, key: &str) -> DeleteOutcome;
}

/// Read and decode a JSON entry. A value that no longer decodes is a miss.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "Discarding undecodable {} cache entry '{}': {}",
                store.backend(),
                key,
                e
            );
            None
        }
    }
}

/// Encode and write a JSON entry. An encode failure is reported as `Failed`.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> SetOutcome {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, raw, ttl).await,
        Err(e) => {
            warn!("Could not encode cache entry '{}': {}", key, e);
            SetOutcome::Failed
        }
    }
}

/// A store that is always disabled. Every read misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledCacheStore;

#[async_trait]
impl CacheStore for DisabledCacheStore {
    fn backend(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> SetOutcome {
        SetOutcome::Disabled
    }

    async fn delete(&self, _key: &str) -> DeleteOutcome {
        DeleteOutcome::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_store_is_inert() {
        let store = DisabledCacheStore;
        assert!(!store.is_enabled());
        assert_eq!(
            store.set("k", "v".to_string(), Duration::from_secs(60)).await,
            SetOutcome::Disabled
        );
        assert!(store.get("k").await.is_none());
        assert_eq!(store.delete("k").await, DeleteOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = MemoryCacheStore::new();
        store
            .set("k", "{not json".to_string(), Duration::from_secs(60))
            .await;

        let value: Option<Vec<u32>> = get_json(&store, "k").await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let store = MemoryCacheStore::new();
        let outcome = set_json(&store, "k", &vec![1u32, 2, 3], Duration::from_secs(60)).await;
        assert_eq!(outcome, SetOutcome::Stored);

        let value: Option<Vec<u32>> = get_json(&store, "k").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }
}
