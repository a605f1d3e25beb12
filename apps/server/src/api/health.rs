use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tickercache_market_data::{registry::known_provider_names, MarketDataProvider, RateLimiter};

use crate::main_lib::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderStatus {
    name: &'static str,
    configured: bool,
    supports_fundamentals: bool,
    reports_quote_volume: bool,
    /// Whole requests left in the local token bucket.
    remaining_requests: u64,
    quota_scarce: bool,
}

impl ProviderStatus {
    fn new(provider: &dyn MarketDataProvider, limiter: &RateLimiter) -> Self {
        let capabilities = provider.capabilities();
        Self {
            name: provider.name(),
            configured: provider.is_configured(),
            supports_fundamentals: capabilities.supports_fundamentals,
            reports_quote_volume: capabilities.reports_quote_volume,
            remaining_requests: limiter.remaining_tokens(provider.name()).floor() as u64,
            quota_scarce: provider.rate_limit().is_quota_scarce(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    provider: ProviderStatus,
    fallback: Option<ProviderStatus>,
    known_providers: Vec<&'static str>,
    cache_backend: &'static str,
    cache_enabled: bool,
    cache_ttl_secs: u64,
}

/// Liveness plus the provider and cache selection this process is running with.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let service = &state.market_data;
    let registry = service.registry();
    let limiter = registry.rate_limiter();
    let store = service.cache_store();

    Json(HealthStatus {
        status: "ok",
        provider: ProviderStatus::new(registry.active().as_ref(), limiter),
        fallback: registry
            .fallback()
            .map(|p| ProviderStatus::new(p.as_ref(), limiter)),
        known_providers: known_provider_names().collect(),
        cache_backend: store.backend(),
        cache_enabled: store.is_enabled(),
        cache_ttl_secs: service.policy().quote_ttl.as_secs(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(healthz))
}
