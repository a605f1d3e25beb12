use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tickercache_market_data::{
    Candle, DataSource, IntradayInterval, OutputSize, Period, Quote, Resolved,
};

use crate::{error::ApiResult, main_lib::AppState};

/// Body shape shared by every stock route.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub data: T,
    pub source: DataSource,
    pub symbol: String,
    pub provider: String,
    /// Seconds the value stays cached; null when nothing was cached.
    pub cached_for: Option<u64>,
}

impl<T> Envelope<T> {
    fn new(symbol: &str, resolved: Resolved<T>) -> Self {
        Self {
            data: resolved.data,
            source: resolved.source,
            symbol: symbol.trim().to_uppercase(),
            provider: resolved.provider,
            cached_for: resolved.ttl.map(|ttl| ttl.as_secs()),
        }
    }
}

#[derive(Deserialize)]
struct SymbolQuery {
    #[serde(default)]
    symbol: String,
}

#[derive(Deserialize)]
struct IntradayQuery {
    #[serde(default)]
    symbol: String,
    interval: Option<String>,
}

#[derive(Deserialize)]
struct DailyQuery {
    #[serde(default)]
    symbol: String,
    outputsize: Option<String>,
}

#[derive(Deserialize)]
struct ChartQuery {
    #[serde(default)]
    symbol: String,
    period: Option<String>,
}

/// Chart period to route; an omitted or blank parameter means the default.
fn period_param(raw: Option<&str>) -> &str {
    raw.map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(Period::default().as_str())
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SymbolQuery>,
) -> ApiResult<Json<Envelope<Quote>>> {
    let resolved = state.market_data.get_quote(&q.symbol).await?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

async fn get_intraday(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IntradayQuery>,
) -> ApiResult<Json<Envelope<Vec<Candle>>>> {
    let interval = match q.interval.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<IntradayInterval>()?,
        _ => IntradayInterval::default(),
    };
    let resolved = state
        .market_data
        .get_intraday_data(&q.symbol, interval)
        .await?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

async fn get_daily(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DailyQuery>,
) -> ApiResult<Json<Envelope<Vec<Candle>>>> {
    let outputsize = match q.outputsize.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<OutputSize>()?,
        _ => OutputSize::default(),
    };
    let resolved = state
        .market_data
        .get_daily_data(&q.symbol, outputsize)
        .await?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ChartQuery>,
) -> ApiResult<Json<Envelope<Vec<Candle>>>> {
    let period = period_param(q.period.as_deref());
    let resolved = state.market_data.get_chart(&q.symbol, period).await?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

async fn get_mock_quote(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SymbolQuery>,
) -> ApiResult<Json<Envelope<Quote>>> {
    let resolved = state.market_data.mock_quote(&q.symbol)?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

async fn get_mock_chart(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ChartQuery>,
) -> ApiResult<Json<Envelope<Vec<Candle>>>> {
    let period = period_param(q.period.as_deref());
    let resolved = state.market_data.mock_chart(&q.symbol, period)?;
    Ok(Json(Envelope::new(&q.symbol, resolved)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote", get(get_quote))
        .route("/intraday", get(get_intraday))
        .route("/daily", get(get_daily))
        .route("/chart", get(get_chart))
        .route("/mock/quote", get(get_mock_quote))
        .route("/mock/chart", get(get_mock_chart))
}
