//! Shared cache tier over a native Redis connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{CacheStore, DeleteOutcome, SetOutcome};

/// Shared cache speaking the Redis protocol directly.
///
/// The connection manager reconnects on its own after a dropped link. A
/// store built without a URL, or whose first connection failed, is disabled.
pub struct RedisCacheStore {
    conn: Option<ConnectionManager>,
}

impl RedisCacheStore {
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            warn!("Redis cache disabled: REDIS_URL not set");
            return Self::disabled();
        };

        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                warn!("Redis cache disabled: invalid REDIS_URL: {}", e);
                return Self::disabled();
            }
        };

        match ConnectionManager::new(client).await {
            Ok(conn) => {
                info!("Redis cache connected");
                Self { conn: Some(conn) }
            }
            Err(e) => {
                warn!("Redis cache disabled: connection failed: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { conn: None }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn is_shared(&self) -> bool {
        self.is_enabled()
    }

    fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis GET '{}' failed: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> SetOutcome {
        let Some(mut conn) = self.conn.clone() else {
            return SetOutcome::Disabled;
        };
        match conn
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
        {
            Ok(()) => SetOutcome::Stored,
            Err(e) => {
                warn!("Redis SET '{}' failed: {}", key, e);
                SetOutcome::Failed
            }
        }
    }

    async fn delete(&self, key: &str) -> DeleteOutcome {
        let Some(mut conn) = self.conn.clone() else {
            return DeleteOutcome::Disabled;
        };
        match conn.del::<_, i64>(key).await {
            Ok(0) => DeleteOutcome::NotFound,
            Ok(_) => DeleteOutcome::Removed,
            Err(e) => {
                warn!("Redis DEL '{}' failed: {}", key, e);
                DeleteOutcome::Failed
            }
        }
    }
}
