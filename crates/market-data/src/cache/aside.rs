use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{get_json, set_json, CacheStore, DeleteOutcome, SetOutcome};

/// Where a resolved value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueOrigin {
    Cache,
    Upstream,
}

/// Cache-aside orchestration over one [`CacheStore`].
///
/// There is no stampede protection: concurrent misses on the same key each
/// call the producer and the last write wins. Errors are never cached.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Return the cached value for `key`, or produce, store, and return it.
    pub async fn resolve<T, E, F, Fut>(&self, key: &str, ttl: Duration, produce: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.resolve_with_origin(key, ttl, produce)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`resolve`](Self::resolve), also reporting whether the value was
    /// served from the store or freshly produced.
    pub async fn resolve_with_origin<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        produce: F,
    ) -> Result<(T, ValueOrigin), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = get_json::<T>(self.store.as_ref(), key).await {
            debug!("Cache hit: {}", key);
            return Ok((hit, ValueOrigin::Cache));
        }

        debug!("Cache miss: {} ({})", key, self.store.backend());
        let value = produce().await?;

        match set_json(self.store.as_ref(), key, &value, ttl).await {
            SetOutcome::Stored => debug!("Cached {} for {}s", key, ttl.as_secs()),
            SetOutcome::Disabled => {}
            SetOutcome::Failed => debug!("Could not cache {}; serving fresh value", key),
        }

        Ok((value, ValueOrigin::Upstream))
    }

    /// Delete each key. Returns how many were actually present.
    pub async fn invalidate<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let mut removed = 0;
        for key in keys {
            let key = key.as_ref();
            let outcome = self.store.delete(key).await;
            debug!("Invalidate {}: {:?}", key, outcome);
            if outcome == DeleteOutcome::Removed {
                removed += 1;
            }
        }
        removed
    }
}
