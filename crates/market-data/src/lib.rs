//! Tickercache Market Data Crate
//!
//! This crate fetches quotes and candle series for ticker symbols from
//! interchangeable upstream providers and keeps them behind a TTL cache.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers: Alpha Vantage, Finnhub
//! - A process-local cache tier and a shared tier (Upstash REST, or Redis)
//! - Chart periods routed to a single provider call and a look-back window
//! - Deterministic synthetic data for demos and offline development
//!
//! # Architecture
//!
//! ```text
//!                          +--------------------+
//!  symbol, period -------> | MarketDataService  |
//!                          +--------------------+
//!                             |             |
//!                             v             v
//!                     +--------------+  +--------------+
//!                     | Period Router|  |  CacheAside  |  (hit: return stored value)
//!                     +--------------+  +--------------+
//!                             |             | miss
//!                             v             v
//!                          +--------------------+
//!                          |  ProviderRegistry  |  (active / fallback, rate limit)
//!                          +--------------------+
//!                                    |
//!                                    v
//!                          +--------------------+
//!                          |     Provider       |  (Alpha Vantage, Finnhub)
//!                          +--------------------+
//!                                    |
//!                                    v
//!                          +--------------------+
//!                          |  Quote / Candle[]  |
//!                          +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Current quote with optional fundamentals
//! - [`Candle`] - One OHLCV observation
//! - [`CacheStore`] - Key-value store with per-entry TTL
//! - [`MarketDataProvider`] - Upstream adapter contract
//! - [`MarketDataService`] - Facade used by the HTTP layer

pub mod cache;
pub mod config;
pub mod errors;
pub mod mock;
pub mod models;
pub mod period;
pub mod provider;
pub mod registry;
pub mod service;

pub use cache::{
    CacheAside, CacheKey, CacheStore, DeleteOutcome, DisabledCacheStore, MemoryCacheStore,
    SetOutcome, UpstashCacheStore, UpstashConfig, ValueOrigin,
};
#[cfg(feature = "redis")]
pub use cache::RedisCacheStore;

pub use config::{CacheBackend, CachePolicy, Environment, MarketDataConfig, ProviderCredentials};
pub use errors::{MarketDataError, RetryClass};
pub use models::{Candle, Fundamentals, IntradayInterval, OutputSize, Quote};
pub use period::{route, Period, PeriodRoute, SeriesRequest};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub use registry::{ProviderRegistry, RateLimiter, DEFAULT_PROVIDER};
pub use service::{ClearReport, DataSource, MarketDataService, Resolved, MOCK_PROVIDER};
