//! Market data provider trait definitions.
//!
//! This module defines the `MarketDataProvider` trait that every upstream
//! adapter implements.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Candle, Fundamentals, IntradayInterval, OutputSize, Quote};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new upstream source. Adapters
/// translate a normalized request into one provider-specific HTTP call and
/// normalize the response into [`Quote`] or an ascending [`Candle`] series.
///
/// Adapters must be constructible without credentials; a missing key is
/// reported as [`MarketDataError::Configuration`] when a method is called,
/// before any request is sent.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use tickercache_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: Option<String>,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn name(&self) -> &'static str {
///         "myprovider"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             supports_fundamentals: false,
///             reports_quote_volume: true,
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement quote and candle methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier used in logs and errors, e.g. "FINNHUB".
    fn id(&self) -> &'static str;

    /// Registry name, also the provider segment of cache keys, e.g. "finnhub".
    fn name(&self) -> &'static str;

    /// Describes the optional capabilities of this provider.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Quota of the provider tier this adapter targets.
    fn rate_limit(&self) -> RateLimit;

    /// Whether the credential this provider needs is present.
    fn is_configured(&self) -> bool;

    /// Fetch the current quote for a symbol.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Fetch an intraday candle series, oldest first.
    async fn get_intraday_data(
        &self,
        symbol: &str,
        interval: IntradayInterval,
    ) -> Result<Vec<Candle>, MarketDataError>;

    /// Fetch a daily candle series, oldest first.
    async fn get_daily_data(
        &self,
        symbol: &str,
        outputsize: OutputSize,
    ) -> Result<Vec<Candle>, MarketDataError>;

    /// Fetch company fundamentals.
    ///
    /// Default implementation reports the capability as unsupported.
    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::Upstream {
            provider: self.id().to_string(),
            message: "fundamentals not supported".to_string(),
        })
    }
}
