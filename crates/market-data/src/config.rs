//! Environment-driven configuration for providers and cache tiers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::UpstashConfig;
use crate::provider::http::mask_secret;

const PRODUCTION_TTL: Duration = Duration::from_secs(86_400);
const DEVELOPMENT_TTL: Duration = Duration::from_secs(43_200);

/// Deployment environment. Only affects the default cache TTL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Which store backs the cache-aside orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheBackend {
    /// Upstash when its URL and token are set, memory otherwise.
    #[default]
    Auto,
    Memory,
    Upstash,
    Redis,
    None,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CacheBackend::Auto),
            "memory" => Ok(CacheBackend::Memory),
            "upstash" => Ok(CacheBackend::Upstash),
            "redis" => Ok(CacheBackend::Redis),
            "none" | "off" | "disabled" => Ok(CacheBackend::None),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheBackend::Auto => "auto",
            CacheBackend::Memory => "memory",
            CacheBackend::Upstash => "upstash",
            CacheBackend::Redis => "redis",
            CacheBackend::None => "none",
        })
    }
}

/// Time-to-live applied to each kind of cached value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub quote_ttl: Duration,
    pub series_ttl: Duration,
}

impl CachePolicy {
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            quote_ttl: ttl,
            series_ttl: ttl,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::uniform(PRODUCTION_TTL),
            Environment::Development => Self::uniform(DEVELOPMENT_TTL),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Credentials and endpoint overrides for every known provider.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub alpha_vantage_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
    pub alpha_vantage_base_url: Option<String>,
    pub finnhub_base_url: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = |key: &Option<String>| key.as_deref().map(mask_secret);
        f.debug_struct("ProviderCredentials")
            .field("alpha_vantage_api_key", &masked(&self.alpha_vantage_api_key))
            .field("finnhub_api_key", &masked(&self.finnhub_api_key))
            .field("alpha_vantage_base_url", &self.alpha_vantage_base_url)
            .field("finnhub_base_url", &self.finnhub_base_url)
            .finish()
    }
}

/// Everything the market data service needs to start.
///
/// Construction never fails: missing credentials leave a provider
/// unconfigured and missing cache endpoints leave the shared tier disabled.
/// Unparseable values are logged and replaced by their defaults.
#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    /// Registry name of the active provider.
    pub provider: String,
    /// Provider used when the shared cache tier is unavailable.
    pub fallback_provider: Option<String>,
    pub credentials: ProviderCredentials,
    pub cache_backend: CacheBackend,
    pub upstash: UpstashConfig,
    pub redis_url: Option<String>,
    pub environment: Environment,
    pub cache_policy: CachePolicy,
    /// Attach fundamentals to quotes (one extra upstream request each).
    pub enable_fundamentals: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl MarketDataConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = parse_or_default::<Environment>("TC_ENV", get("TC_ENV"));
        let cache_policy = match get("TC_CACHE_TTL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => CachePolicy::uniform(Duration::from_secs(secs)),
                _ => {
                    warn!("Ignoring invalid TC_CACHE_TTL_SECS '{}'", raw);
                    CachePolicy::for_environment(environment)
                }
            },
            None => CachePolicy::for_environment(environment),
        };

        let upstash = UpstashConfig {
            url: get("UPSTASH_REDIS_REST_URL"),
            token: get("UPSTASH_REDIS_REST_TOKEN"),
            ..Default::default()
        };

        Self {
            provider: get("TC_PROVIDER")
                .unwrap_or_else(|| crate::registry::DEFAULT_PROVIDER.to_string()),
            fallback_provider: get("TC_FALLBACK_PROVIDER"),
            credentials: ProviderCredentials {
                alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
                finnhub_api_key: get("FINNHUB_API_KEY"),
                alpha_vantage_base_url: get("ALPHA_VANTAGE_BASE_URL"),
                finnhub_base_url: get("FINNHUB_BASE_URL"),
            },
            cache_backend: parse_or_default("TC_CACHE_BACKEND", get("TC_CACHE_BACKEND")),
            upstash,
            redis_url: get("REDIS_URL"),
            environment,
            cache_policy,
            enable_fundamentals: get("TC_ENABLE_FUNDAMENTALS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// True when the Upstash URL and token are both present.
    pub fn upstash_configured(&self) -> bool {
        self.upstash.url.is_some() && self.upstash.token.is_some()
    }
}

fn parse_or_default<T>(key: &str, raw: Option<String>) -> T
where
    T: FromStr<Err = String> + Default,
{
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring {}: {}", key, e);
            T::default()
        }),
        None => T::default(),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
