//! Shared cache tier over the Upstash Redis REST API.
//!
//! Every command is a POST of a JSON array (`["SET", key, value, "EX", "86400"]`)
//! to the database URL with a bearer token. The reply is `{"result": ...}` on
//! success or `{"error": "..."}` when Redis rejects the command.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CacheStore, DeleteOutcome, SetOutcome};
use crate::provider::http::{self, mask_secret};

const MAX_BACKOFF: Duration = Duration::from_secs(3);

/// Connection settings for the shared tier.
#[derive(Clone)]
pub struct UpstashConfig {
    /// REST endpoint, e.g. `https://eu1-happy-cat-12345.upstash.io`
    pub url: Option<String>,
    /// REST token with read/write access
    pub token: Option<String>,
    /// Extra attempts after a transport failure or a 5xx reply
    pub max_retries: u32,
    /// First retry delay; doubles per attempt up to 3 seconds
    pub retry_backoff: Duration,
    /// Ceiling for one command, retries included
    pub timeout: Duration,
}

impl Default for UpstashConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            timeout: http::REQUEST_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_deref().map(mask_secret))
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Option<Value>,
    error: Option<String>,
}

struct Endpoint {
    url: String,
    token: String,
}

/// Shared, cross-process cache backed by Upstash.
///
/// Without a URL and token the store is disabled: reads miss, writes and
/// deletes report `Disabled`, and no request is ever sent.
pub struct UpstashCacheStore {
    client: Client,
    endpoint: Option<Endpoint>,
    max_retries: u32,
    retry_backoff: Duration,
    timeout: Duration,
}

impl UpstashCacheStore {
    pub fn new(config: UpstashConfig) -> Self {
        let endpoint = match (non_blank(config.url), non_blank(config.token)) {
            (Some(url), Some(token)) => {
                info!(
                    "Shared cache enabled at {} (token {})",
                    url,
                    mask_secret(&token)
                );
                Some(Endpoint {
                    url: url.trim_end_matches('/').to_string(),
                    token,
                })
            }
            _ => {
                warn!("Shared cache disabled: UPSTASH_REDIS_REST_URL or UPSTASH_REDIS_REST_TOKEN not set");
                None
            }
        };

        Self {
            client: http::build_client(),
            endpoint,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            timeout: config.timeout,
        }
    }

    /// Run one Redis command. `None` when the store is disabled.
    ///
    /// The whole exchange, retries and backoff included, is bounded by the
    /// configured timeout; running out of time is a failure like any other.
    async fn command(&self, args: &[&str]) -> Option<Result<Option<Value>, String>> {
        let endpoint = self.endpoint.as_ref()?;
        match tokio::time::timeout(self.timeout, self.run_with_retries(endpoint, args)).await {
            Ok(result) => Some(result),
            Err(_) => Some(Err(format!(
                "{} timed out after {}ms",
                args[0],
                self.timeout.as_millis()
            ))),
        }
    }

    async fn run_with_retries(
        &self,
        endpoint: &Endpoint,
        args: &[&str],
    ) -> Result<Option<Value>, String> {
        let mut attempt = 0;

        loop {
            let outcome = self.send_once(endpoint, args).await;
            match outcome {
                Err(CommandFailure::Retryable(message)) if attempt < self.max_retries => {
                    let delay = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(MAX_BACKOFF);
                    debug!(
                        "Upstash {} failed ({}), retrying in {:?}",
                        args[0], message, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(CommandFailure::Retryable(message)) | Err(CommandFailure::Fatal(message)) => {
                    return Err(message);
                }
                Ok(result) => return Ok(result),
            }
        }
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        args: &[&str],
    ) -> Result<Option<Value>, CommandFailure> {
        let response = self
            .client
            .post(&endpoint.url)
            .bearer_auth(&endpoint.token)
            .json(args)
            .send()
            .await
            .map_err(|e| {
                // A hung endpoint already used up a full client timeout
                if e.is_timeout() {
                    CommandFailure::Fatal(e.without_url().to_string())
                } else {
                    CommandFailure::Retryable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CommandFailure::Retryable(format!("HTTP {}", status)));
        }

        let body: CommandResponse = response
            .json()
            .await
            .map_err(|e| CommandFailure::Fatal(format!("HTTP {}: {}", status, e)))?;

        if let Some(error) = body.error {
            return Err(CommandFailure::Fatal(error));
        }
        if !status.is_success() {
            return Err(CommandFailure::Fatal(format!("HTTP {}", status)));
        }

        Ok(body.result.filter(|v| !v.is_null()))
    }
}

enum CommandFailure {
    Retryable(String),
    Fatal(String),
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl CacheStore for UpstashCacheStore {
    fn backend(&self) -> &'static str {
        "upstash"
    }

    fn is_shared(&self) -> bool {
        self.is_enabled()
    }

    fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.command(&["GET", key]).await? {
            Ok(Some(Value::String(value))) => Some(value),
            Ok(Some(other)) => {
                warn!("Upstash GET '{}' returned a non-string value: {}", key, other);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Upstash GET '{}' failed: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> SetOutcome {
        let ttl_secs = ttl.as_secs().max(1).to_string();
        let Some(result) = self
            .command(&["SET", key, value.as_str(), "EX", ttl_secs.as_str()])
            .await
        else {
            return SetOutcome::Disabled;
        };

        match result {
            Ok(Some(Value::String(ok))) if ok == "OK" => SetOutcome::Stored,
            Ok(other) => {
                warn!("Upstash SET '{}' unexpected reply: {:?}", key, other);
                SetOutcome::Failed
            }
            Err(e) => {
                warn!("Upstash SET '{}' failed: {}", key, e);
                SetOutcome::Failed
            }
        }
    }

    async fn delete(&self, key: &str) -> DeleteOutcome {
        let Some(result) = self.command(&["DEL", key]).await else {
            return DeleteOutcome::Disabled;
        };

        match result {
            Ok(Some(count)) if count.as_i64().unwrap_or(0) > 0 => DeleteOutcome::Removed,
            Ok(_) => DeleteOutcome::NotFound,
            Err(e) => {
                warn!("Upstash DEL '{}' failed: {}", key, e);
                DeleteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_configuration_disables_store() {
        let store = UpstashCacheStore::new(UpstashConfig {
            url: Some("https://example.upstash.io".to_string()),
            token: None,
            ..Default::default()
        });

        assert!(!store.is_enabled());
        assert!(store.get("k").await.is_none());
        assert_eq!(
            store.set("k", "v".to_string(), Duration::from_secs(60)).await,
            SetOutcome::Disabled
        );
        assert_eq!(store.delete("k").await, DeleteOutcome::Disabled);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let store = UpstashCacheStore::new(UpstashConfig {
            url: Some("   ".to_string()),
            token: Some("token".to_string()),
            ..Default::default()
        });
        assert!(!store.is_enabled());
    }

    #[test]
    fn test_command_response_parsing() {
        let ok: CommandResponse = serde_json::from_str(r#"{"result":"OK"}"#).unwrap();
        assert_eq!(ok.result, Some(Value::String("OK".to_string())));

        let miss: CommandResponse = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(miss.result.is_none());

        let err: CommandResponse =
            serde_json::from_str(r#"{"error":"WRONGPASS invalid password"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("WRONGPASS invalid password"));
    }
}
