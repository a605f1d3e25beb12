//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limit descriptions
//! - Concrete provider implementations (Alpha Vantage, Finnhub)
//! - The optional fundamentals enrichment step for quotes
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: the orchestrator and period router only see the trait
//! - **Extensible**: new providers implement `MarketDataProvider` and register a constructor
//! - **Lazy about credentials**: adapters build without keys and fail per call

mod capabilities;
pub mod http;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::MarketDataProvider;

use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::Quote;

/// Fetch a quote and, when asked for and supported, attach fundamentals.
///
/// The fundamentals call is a second upstream request. Its failure never
/// fails the quote: the error is logged and the quote keeps an empty
/// fundamentals block.
pub async fn fetch_quote(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    with_fundamentals: bool,
) -> Result<Quote, MarketDataError> {
    let quote = provider.get_quote(symbol).await?;

    if !with_fundamentals || !provider.capabilities().supports_fundamentals {
        return Ok(quote);
    }

    debug!(
        "Fetching fundamentals for {} from {} (extra request)",
        symbol,
        provider.id()
    );

    match provider.get_fundamentals(symbol).await {
        Ok(fundamentals) => Ok(quote.with_fundamentals(fundamentals)),
        Err(e) => {
            warn!("Fundamentals unavailable for {}: {}", symbol, e);
            Ok(quote)
        }
    }
}
