//! Market data service: the one entry point edge handlers talk to.
//!
//! Ties together the provider registry, the cache-aside orchestrator and the
//! period router. Every method returns a [`Resolved`] that says where the
//! data came from and how long it stays cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheAside, CacheKey, CacheStore, DisabledCacheStore, MemoryCacheStore, UpstashCacheStore,
    ValueOrigin,
};
use crate::config::{CacheBackend, CachePolicy, MarketDataConfig};
use crate::errors::MarketDataError;
use crate::mock;
use crate::models::{Candle, IntradayInterval, OutputSize, Quote};
use crate::period::{route, Period, SeriesRequest};
use crate::provider::{fetch_quote, MarketDataProvider};
use crate::registry::{canonical_provider_name, ProviderRegistry};

/// Provider label used for synthetic data.
pub const MOCK_PROVIDER: &str = "mock";

/// Where the data in a [`Resolved`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Api,
    Mock,
}

impl From<ValueOrigin> for DataSource {
    fn from(origin: ValueOrigin) -> Self {
        match origin {
            ValueOrigin::Cache => DataSource::Cache,
            ValueOrigin::Upstream => DataSource::Api,
        }
    }
}

/// A value plus the facts a response envelope needs about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved<T> {
    pub data: T,
    pub source: DataSource,
    /// Registry name of the provider, or `"mock"`.
    pub provider: String,
    /// Cache lifetime; `None` when nothing is cached.
    pub ttl: Option<Duration>,
}

/// Outcome of clearing a symbol's entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub symbol: String,
    pub provider: String,
    /// Keys that were present and removed.
    pub cleared: usize,
    /// Every key a delete was issued for.
    pub keys: Vec<String>,
}

pub struct MarketDataService {
    registry: ProviderRegistry,
    cache: CacheAside,
    policy: CachePolicy,
    enable_fundamentals: bool,
}

impl MarketDataService {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn CacheStore>,
        policy: CachePolicy,
        enable_fundamentals: bool,
    ) -> Self {
        Self {
            registry,
            cache: CacheAside::new(store),
            policy,
            enable_fundamentals,
        }
    }

    /// Build the registry and the configured cache store.
    pub async fn from_config(config: &MarketDataConfig) -> Self {
        let registry = ProviderRegistry::from_config(config);
        let store = build_cache_store(config).await;
        info!(
            "Cache backend: {} (quote TTL {}s, series TTL {}s)",
            store.backend(),
            config.cache_policy.quote_ttl.as_secs(),
            config.cache_policy.series_ttl.as_secs()
        );
        Self::new(
            registry,
            store,
            config.cache_policy,
            config.enable_fundamentals,
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        self.cache.store()
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Adapter serving live requests right now.
    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        self.registry.for_cache(self.cache.store().is_shared())
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Resolved<Quote>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        let provider = self.provider();
        let key = CacheKey::quote(&symbol, provider.name());
        let ttl = self.policy.quote_ttl;

        let (quote, origin) = self
            .cache
            .resolve_with_origin(key.as_str(), ttl, || {
                fetch_quote(provider.as_ref(), &symbol, self.enable_fundamentals)
            })
            .await?;

        Ok(self.resolved(quote, origin, provider.name(), ttl))
    }

    pub async fn get_intraday_data(
        &self,
        symbol: &str,
        interval: IntradayInterval,
    ) -> Result<Resolved<Vec<Candle>>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        self.resolve_series(&symbol, SeriesRequest::Intraday(interval))
            .await
    }

    pub async fn get_daily_data(
        &self,
        symbol: &str,
        outputsize: OutputSize,
    ) -> Result<Resolved<Vec<Candle>>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        self.resolve_series(&symbol, SeriesRequest::Daily(outputsize))
            .await
    }

    /// Candles for a chart period, filtered to the period's window.
    ///
    /// The unfiltered series is what gets cached, so periods that share a
    /// provider call (1M, 3M and 6M) share one entry.
    pub async fn get_chart(
        &self,
        symbol: &str,
        period: &str,
    ) -> Result<Resolved<Vec<Candle>>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        let route = route(period);
        let resolved = self.resolve_series(&symbol, route.request).await?;

        let total = resolved.data.len();
        let candles = route.filter(resolved.data, Utc::now());
        debug!(
            "Chart {} {}: kept {} of {} candles",
            symbol,
            route.period,
            candles.len(),
            total
        );

        Ok(Resolved {
            data: candles,
            ..resolved
        })
    }

    async fn resolve_series(
        &self,
        symbol: &str,
        request: SeriesRequest,
    ) -> Result<Resolved<Vec<Candle>>, MarketDataError> {
        let provider = self.provider();
        let key = series_key(symbol, request, provider.name());
        let ttl = self.policy.series_ttl;

        let (candles, origin) = self
            .cache
            .resolve_with_origin(key.as_str(), ttl, || {
                request.fetch(provider.as_ref(), symbol)
            })
            .await?;

        Ok(self.resolved(candles, origin, provider.name(), ttl))
    }

    /// Delete every entry the service writes for `symbol` under one provider.
    ///
    /// `provider` accepts any registry alias and defaults to the provider
    /// currently serving requests.
    pub async fn clear_symbol(
        &self,
        symbol: &str,
        provider: Option<&str>,
    ) -> Result<ClearReport, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        let provider = match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => canonical_provider_name(name).ok_or_else(|| {
                MarketDataError::InvalidRequest(format!("unknown provider '{}'", name))
            })?,
            None => self.provider().name(),
        };

        let keys: Vec<String> = [
            CacheKey::quote(&symbol, provider),
            series_key(
                &symbol,
                Period::TenDays.series_request(),
                provider,
            ),
            CacheKey::daily(&symbol, OutputSize::Compact, provider),
            CacheKey::daily(&symbol, OutputSize::Full, provider),
        ]
        .into_iter()
        .map(|key| key.to_string())
        .collect();

        if !self.cache.store().is_enabled() {
            warn!("Cache is disabled; nothing to clear for {}", symbol);
        }
        let cleared = self.cache.invalidate(&keys).await;
        info!("Cleared {} cache entries for {} ({})", cleared, symbol, provider);

        Ok(ClearReport {
            symbol,
            provider: provider.to_string(),
            cleared,
            keys,
        })
    }

    /// Synthetic quote. Never fails except on a blank symbol.
    pub fn mock_quote(&self, symbol: &str) -> Result<Resolved<Quote>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        Ok(mock_resolved(mock::mock_quote(&symbol)))
    }

    /// Synthetic series for a chart period. Unknown periods fall back to 1M.
    pub fn mock_chart(
        &self,
        symbol: &str,
        period: &str,
    ) -> Result<Resolved<Vec<Candle>>, MarketDataError> {
        let symbol = require_symbol(symbol)?;
        let period = route(period).period;
        Ok(mock_resolved(mock::mock_series(&symbol, period)))
    }

    fn resolved<T>(
        &self,
        data: T,
        origin: ValueOrigin,
        provider: &str,
        ttl: Duration,
    ) -> Resolved<T> {
        Resolved {
            data,
            source: origin.into(),
            provider: provider.to_string(),
            ttl: self.cache.store().is_enabled().then_some(ttl),
        }
    }
}

fn mock_resolved<T>(data: T) -> Resolved<T> {
    Resolved {
        data,
        source: DataSource::Mock,
        provider: MOCK_PROVIDER.to_string(),
        ttl: None,
    }
}

fn series_key(symbol: &str, request: SeriesRequest, provider: &str) -> CacheKey {
    match request {
        SeriesRequest::Intraday(interval) => CacheKey::intraday(symbol, interval, provider),
        SeriesRequest::Daily(outputsize) => CacheKey::daily(symbol, outputsize, provider),
    }
}

/// Trim and upper-case a symbol, rejecting blanks.
fn require_symbol(symbol: &str) -> Result<String, MarketDataError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(MarketDataError::InvalidRequest(
            "symbol is required".to_string(),
        ));
    }
    Ok(symbol.to_uppercase())
}

/// Construct the store selected by `cache_backend`.
///
/// `auto` picks Upstash when it is configured and the in-process store
/// otherwise. Asking for Redis without the `redis` feature falls back to
/// the in-process store with a warning.
pub async fn build_cache_store(config: &MarketDataConfig) -> Arc<dyn CacheStore> {
    match config.cache_backend {
        CacheBackend::Auto if config.upstash_configured() => {
            Arc::new(UpstashCacheStore::new(config.upstash.clone()))
        }
        CacheBackend::Auto | CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::Upstash => Arc::new(UpstashCacheStore::new(config.upstash.clone())),
        CacheBackend::Redis => build_redis_store(config).await,
        CacheBackend::None => Arc::new(DisabledCacheStore),
    }
}

#[cfg(feature = "redis")]
async fn build_redis_store(config: &MarketDataConfig) -> Arc<dyn CacheStore> {
    Arc::new(crate::cache::RedisCacheStore::connect(config.redis_url.as_deref()).await)
}

#[cfg(not(feature = "redis"))]
async fn build_redis_store(_config: &MarketDataConfig) -> Arc<dyn CacheStore> {
    warn!("TC_CACHE_BACKEND=redis needs the `redis` feature; using the in-memory cache");
    Arc::new(MemoryCacheStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(store: Arc<dyn CacheStore>) -> MarketDataService {
        let config = MarketDataConfig::default();
        MarketDataService::new(
            ProviderRegistry::from_config(&config),
            store,
            CachePolicy::default(),
            false,
        )
    }

    #[test]
    fn test_require_symbol() {
        assert_eq!(require_symbol(" aapl ").unwrap(), "AAPL");
        assert!(matches!(
            require_symbol("   "),
            Err(MarketDataError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_data_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DataSource::Api).unwrap(), "\"api\"");
        assert_eq!(DataSource::from(ValueOrigin::Cache), DataSource::Cache);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_not_cached() {
        let store = Arc::new(MemoryCacheStore::new());
        let service = service(store.clone());

        let err = service.get_quote("AAPL").await.unwrap_err();
        assert!(matches!(err, MarketDataError::Configuration { .. }));
        let key = CacheKey::quote("AAPL", service.registry().active().name());
        assert!(store.get(key.as_str()).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_symbol_issues_four_deletes() {
        let store = Arc::new(MemoryCacheStore::new());
        store
            .set("stock:quote:AAPL:finnhub", "{}".to_string(), Duration::from_secs(60))
            .await;
        let service = service(store);

        let report = service.clear_symbol("aapl", None).await.unwrap();
        assert_eq!(report.cleared, 1);
        assert_eq!(
            report.keys,
            vec![
                "stock:quote:AAPL:finnhub",
                "stock:intraday:AAPL:5min:finnhub",
                "stock:daily:AAPL:compact:finnhub",
                "stock:daily:AAPL:full:finnhub",
            ]
        );

        let again = service.clear_symbol("AAPL", Some("finnhub")).await.unwrap();
        assert_eq!(again.cleared, 0);
    }

    #[tokio::test]
    async fn test_clear_symbol_accepts_aliases() {
        let service = service(Arc::new(MemoryCacheStore::new()));
        let report = service
            .clear_symbol("IBM", Some("Alpha-Vantage"))
            .await
            .unwrap();
        assert_eq!(report.provider, "alphavantage");
        assert!(service.clear_symbol("IBM", Some("iex")).await.is_err());
    }

    #[test]
    fn test_mock_responses_are_labelled() {
        let service = service(Arc::new(DisabledCacheStore));
        let quote = service.mock_quote("msft").unwrap();
        assert_eq!(quote.source, DataSource::Mock);
        assert_eq!(quote.provider, "mock");
        assert_eq!(quote.data.symbol, "MSFT");
        assert!(quote.ttl.is_none());

        let chart = service.mock_chart("MSFT", "bogus").unwrap();
        assert_eq!(chart.data.len(), 31);
    }

    #[tokio::test]
    async fn test_build_cache_store_auto() {
        let memory = build_cache_store(&MarketDataConfig::default()).await;
        assert_eq!(memory.backend(), "memory");

        let config = MarketDataConfig {
            cache_backend: CacheBackend::None,
            ..Default::default()
        };
        assert!(!build_cache_store(&config).await.is_enabled());
    }
}
