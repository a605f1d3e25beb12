//! Provider registry: name-based selection of the active adapter.
//!
//! The registry handles:
//! - Mapping configured names (and their aliases) to adapter constructors
//! - Falling back to the default provider for unknown names
//! - Holding the optional fallback adapter for when the shared cache is down
//! - Wrapping every adapter in the per-provider token bucket

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::RateLimiter;
use crate::config::{MarketDataConfig, ProviderCredentials};
use crate::errors::MarketDataError;
use crate::models::{Candle, Fundamentals, IntradayInterval, OutputSize, Quote};
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

/// Provider selected when the configured name is missing or unknown.
pub const DEFAULT_PROVIDER: &str = "finnhub";

type ProviderConstructor = fn(&ProviderCredentials) -> Arc<dyn MarketDataProvider>;

/// Accepted names (lower-case), the adapter's own name, and its constructor.
const CONSTRUCTORS: &[(&str, &str, ProviderConstructor)] = &[
    ("alphavantage", "alphavantage", build_alpha_vantage),
    ("alpha-vantage", "alphavantage", build_alpha_vantage),
    ("alpha_vantage", "alphavantage", build_alpha_vantage),
    ("finnhub", "finnhub", build_finnhub),
];

fn build_alpha_vantage(credentials: &ProviderCredentials) -> Arc<dyn MarketDataProvider> {
    let provider = AlphaVantageProvider::new(credentials.alpha_vantage_api_key.clone());
    match &credentials.alpha_vantage_base_url {
        Some(url) => Arc::new(provider.with_base_url(url.clone())),
        None => Arc::new(provider),
    }
}

fn build_finnhub(credentials: &ProviderCredentials) -> Arc<dyn MarketDataProvider> {
    let provider = FinnhubProvider::new(credentials.finnhub_api_key.clone());
    match &credentials.finnhub_base_url {
        Some(url) => Arc::new(provider.with_base_url(url.clone())),
        None => Arc::new(provider),
    }
}

fn lookup(name: &str) -> Option<(&'static str, ProviderConstructor)> {
    let name = name.trim().to_ascii_lowercase();
    CONSTRUCTORS
        .iter()
        .find(|(alias, _, _)| *alias == name)
        .map(|(_, canonical, constructor)| (*canonical, *constructor))
}

/// Every name [`ProviderRegistry::select`] accepts.
pub fn known_provider_names() -> impl Iterator<Item = &'static str> {
    CONSTRUCTORS.iter().map(|(alias, _, _)| *alias)
}

/// Adapter name an accepted alias resolves to, e.g. `alpha-vantage` to
/// `alphavantage`. `None` for unknown names.
pub fn canonical_provider_name(name: &str) -> Option<&'static str> {
    lookup(name).map(|(canonical, _)| canonical)
}

/// Holds the active adapter and, optionally, a fallback adapter.
///
/// Both are immutable after construction and shared by every request.
pub struct ProviderRegistry {
    active: Arc<dyn MarketDataProvider>,
    fallback: Option<Arc<dyn MarketDataProvider>>,
    rate_limiter: Arc<RateLimiter>,
}

impl ProviderRegistry {
    /// Build the registry from configuration. Never fails: a provider
    /// without its credential is still constructed and reports
    /// `Configuration` on each call.
    pub fn from_config(config: &MarketDataConfig) -> Self {
        let active = Self::select(&config.provider, &config.credentials);
        let fallback = config
            .fallback_provider
            .as_deref()
            .map(|name| Self::select(name, &config.credentials))
            .filter(|fallback| fallback.name() != active.name());

        info!(
            "Market data provider: {}{}",
            active.name(),
            fallback
                .as_ref()
                .map(|f| format!(" (fallback: {})", f.name()))
                .unwrap_or_default()
        );
        if !active.is_configured() {
            warn!(
                "Provider '{}' has no API key; live requests will fail until one is set",
                active.name()
            );
        }

        Self::with_providers(active, fallback)
    }

    /// Build from ready-made adapters. Each one is put behind the rate limiter.
    pub fn with_providers(
        active: Arc<dyn MarketDataProvider>,
        fallback: Option<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new());
        let throttle = |provider: Arc<dyn MarketDataProvider>| -> Arc<dyn MarketDataProvider> {
            rate_limiter.configure(provider.name(), provider.rate_limit());
            Arc::new(ThrottledProvider {
                inner: provider,
                limiter: Arc::clone(&rate_limiter),
            })
        };

        let active = throttle(active);
        let fallback = fallback.map(throttle);

        Self {
            active,
            fallback,
            rate_limiter,
        }
    }

    /// Construct the adapter registered under `name`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown names resolve to [`DEFAULT_PROVIDER`] with a warning.
    pub fn select(name: &str, credentials: &ProviderCredentials) -> Arc<dyn MarketDataProvider> {
        match lookup(name) {
            Some((_, constructor)) => constructor(credentials),
            None => {
                warn!(
                    "Unknown provider '{}', using '{}'",
                    name.trim(),
                    DEFAULT_PROVIDER
                );
                build_finnhub(credentials)
            }
        }
    }

    pub fn active(&self) -> &Arc<dyn MarketDataProvider> {
        &self.active
    }

    pub fn fallback(&self) -> Option<&Arc<dyn MarketDataProvider>> {
        self.fallback.as_ref()
    }

    /// Adapter to use given the state of the shared cache tier.
    ///
    /// A configured fallback takes over only while the shared tier is
    /// unavailable; otherwise the active adapter serves.
    pub fn for_cache(&self, shared_tier_enabled: bool) -> &Arc<dyn MarketDataProvider> {
        match (&self.fallback, shared_tier_enabled) {
            (Some(fallback), false) => {
                debug!(
                    "Shared cache unavailable, serving from fallback '{}'",
                    fallback.name()
                );
                fallback
            }
            _ => &self.active,
        }
    }

    /// Whether the active adapter has its credential.
    pub fn is_available(&self) -> bool {
        self.active.is_configured()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

/// Adapter decorator that spends a token before every upstream call.
struct ThrottledProvider {
    inner: Arc<dyn MarketDataProvider>,
    limiter: Arc<RateLimiter>,
}

impl ThrottledProvider {
    fn acquire(&self) -> Result<(), MarketDataError> {
        // Unconfigured calls never reach the network, so they cost nothing.
        if !self.inner.is_configured() || self.limiter.try_acquire(self.inner.name()) {
            return Ok(());
        }
        let wait = self.limiter.time_until_available(self.inner.name());
        Err(MarketDataError::rate_limited(
            self.inner.id(),
            format!("local request budget exhausted, retry in {}s", wait.as_secs().max(1)),
        ))
    }
}

#[async_trait]
impl MarketDataProvider for ThrottledProvider {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    fn rate_limit(&self) -> RateLimit {
        self.inner.rate_limit()
    }

    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.acquire()?;
        self.inner.get_quote(symbol).await
    }

    async fn get_intraday_data(
        &self,
        symbol: &str,
        interval: IntradayInterval,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.acquire()?;
        self.inner.get_intraday_data(symbol, interval).await
    }

    async fn get_daily_data(
        &self,
        symbol: &str,
        outputsize: OutputSize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.acquire()?;
        self.inner.get_daily_data(symbol, outputsize).await
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        self.acquire()?;
        self.inner.get_fundamentals(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ProviderCredentials {
        ProviderCredentials {
            alpha_vantage_api_key: Some("av-key".to_string()),
            finnhub_api_key: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_aliases_resolve_to_alpha_vantage() {
        for name in ["alphavantage", "alpha-vantage", "alpha_vantage", " AlphaVantage "] {
            let provider = ProviderRegistry::select(name, &credentials());
            assert_eq!(provider.name(), "alphavantage", "alias {}", name);
        }
    }

    #[test]
    fn test_unknown_name_uses_default() {
        let provider = ProviderRegistry::select("bloomberg", &credentials());
        assert_eq!(provider.name(), DEFAULT_PROVIDER);
    }

    #[test]
    fn test_missing_credential_still_constructs() {
        let provider = ProviderRegistry::select("FINNHUB", &credentials());
        assert_eq!(provider.name(), "finnhub");
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_for_cache_prefers_fallback_only_when_shared_tier_down() {
        let config = MarketDataConfig {
            provider: "alphavantage".to_string(),
            fallback_provider: Some("finnhub".to_string()),
            credentials: credentials(),
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config);

        assert_eq!(registry.for_cache(true).name(), "alphavantage");
        assert_eq!(registry.for_cache(false).name(), "finnhub");
        assert!(registry.is_available());
    }

    #[test]
    fn test_fallback_equal_to_active_is_dropped() {
        let config = MarketDataConfig {
            provider: "finnhub".to_string(),
            fallback_provider: Some("FinnHub".to_string()),
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.fallback().is_none());
        assert_eq!(registry.for_cache(false).name(), "finnhub");
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_provider_name("Alpha_Vantage"), Some("alphavantage"));
        assert_eq!(canonical_provider_name("finnhub"), Some("finnhub"));
        assert_eq!(canonical_provider_name("iex"), None);
    }

    #[test]
    fn test_known_names() {
        let names: Vec<_> = known_provider_names().collect();
        assert!(names.contains(&"finnhub"));
        assert!(names.contains(&"alpha-vantage"));
    }
}
