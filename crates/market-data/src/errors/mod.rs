//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The error enum for every provider call
//! - [`RetryClass`]: Classification callers use to decide on backoff

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching market data.
///
/// Cache stores never produce these; a cache failure degrades to a miss.
/// Everything here comes from a provider adapter (or the local throttle in
/// front of one) and propagates through the cache-aside orchestrator
/// untouched.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// A credential or endpoint is missing. Raised before any network call.
    #[error("Configuration error: {provider} - {message}")]
    Configuration {
        /// The provider that could not be called
        provider: String,
        /// What is missing
        message: String,
    },

    /// The provider quota is exhausted (HTTP 429, or a quota notice in the body).
    #[error("Rate limited: {provider} - {message}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// Provider-supplied notice, or a local description
        message: String,
    },

    /// The request was valid but the provider has nothing for it.
    #[error("No data for {symbol}: {message}")]
    NoData {
        /// Symbol that was requested
        symbol: String,
        /// Which series or endpoint came back empty
        message: String,
    },

    /// Timeout, refused connection, or a body that could not be read.
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// The provider that could not be reached
        provider: String,
        /// The underlying failure
        message: String,
    },

    /// Any other provider failure: error payloads, unexpected statuses,
    /// bodies that do not match the documented shape.
    #[error("Provider error: {provider} - {message}")]
    Upstream {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The caller asked for something no provider call can express.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MarketDataError {
    pub(crate) fn configuration(provider: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn rate_limited(provider: &str, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn no_data(symbol: &str, message: impl Into<String>) -> Self {
        Self::NoData {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn upstream(provider: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use tickercache_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited {
    ///     provider: "FINNHUB".to_string(),
    ///     message: "HTTP 429".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::InvalidRequest("interval 7min".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Configuration { .. } | Self::NoData { .. } | Self::InvalidRequest(_) => {
                RetryClass::Never
            }
            Self::RateLimited { .. } => RetryClass::WithBackoff,
            Self::Transport { .. } => RetryClass::Transient,
            Self::Upstream { .. } => RetryClass::Upstream,
        }
    }
}
