use std::sync::Arc;

use tickercache_market_data::MarketDataService;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub market_data: MarketDataService,
}

pub fn init_tracing() {
    let log_format = std::env::var("TC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let market_data = MarketDataService::from_config(&config.market_data).await;

    let registry = market_data.registry();
    tracing::info!(
        "Active provider: {} (configured: {}), fallback: {}",
        registry.active().name(),
        registry.active().is_configured(),
        registry
            .fallback()
            .map(|p| p.name())
            .unwrap_or("none")
    );
    if !registry.is_available() {
        tracing::warn!("Active provider has no API key; live stock routes will answer 503 unless the fallback serves");
    }

    Ok(Arc::new(AppState { market_data }))
}
