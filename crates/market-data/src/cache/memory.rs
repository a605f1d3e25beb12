//! Process-local cache tier with per-entry TTL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{CacheStore, DeleteOutcome, SetOutcome};

#[derive(Debug)]
struct MemoryEntry {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// In-memory cache visible to one process only.
///
/// There is no capacity bound and no background sweeper: an entry is
/// checked against its TTL when read or deleted and removed if stale.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        // check and removal happen under one shard lock
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!("Memory cache entry '{}' expired", key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> SetOutcome {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        SetOutcome::Stored
    }

    async fn delete(&self, key: &str) -> DeleteOutcome {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired(now) => DeleteOutcome::Removed,
            // a lapsed entry was already gone as far as readers are concerned
            _ => DeleteOutcome::NotFound,
        }
    }
}
