//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::warn;

use crate::errors::MarketDataError;

/// Ceiling on every upstream call. Past this the call fails as a transport error.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the client used by an adapter.
pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

/// Send a request and read the body as text.
///
/// Anything that goes wrong before a status line is received, or while the
/// body is read, is a transport failure. Status handling is left to the
/// adapter because providers disagree on what 401/403 mean.
pub(crate) async fn send(
    provider: &str,
    request: RequestBuilder,
) -> Result<(StatusCode, String), MarketDataError> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("request timed out after {}s", REQUEST_TIMEOUT.as_secs())
        } else {
            format!("request failed: {}", e.without_url())
        };
        MarketDataError::transport(provider, message)
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        MarketDataError::transport(provider, format!("failed to read response: {}", e))
    })?;

    Ok((status, body))
}

/// Mask a credential for log output, keeping the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
