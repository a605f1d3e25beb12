//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Current quotes via /quote
//! - Intraday and daily candles via /stock/candle
//! - Fundamentals (market cap, shares, exchange) via /stock/profile2
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use num_traits::ToPrimitive;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{sort_candles, Candle, Fundamentals, IntradayInterval, OutputSize, Quote};
use crate::provider::http;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";
const PROVIDER_NAME: &str = "finnhub";

/// Intraday requests always cover this many days back from now.
const INTRADAY_LOOKBACK_DAYS: i64 = 10;
const COMPACT_LOOKBACK_DAYS: i64 = 100;
const FULL_LOOKBACK_DAYS: i64 = 5 * 365;

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from /stock/candle endpoint
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    /// Close prices
    #[serde(default)]
    c: Vec<f64>,
    /// High prices
    #[serde(default)]
    h: Vec<f64>,
    /// Low prices
    #[serde(default)]
    l: Vec<f64>,
    /// Open prices
    #[serde(default)]
    o: Vec<f64>,
    /// Volume
    #[serde(default)]
    v: Vec<f64>,
    /// Timestamps (Unix)
    #[serde(default)]
    t: Vec<i64>,
}

/// Response from /stock/profile2 endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    ticker: Option<String>,
    exchange: Option<String>,
    /// Market capitalization (in millions)
    market_capitalization: Option<f64>,
    /// Shares outstanding (in millions)
    share_outstanding: Option<f64>,
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
///
/// The API key travels in the `X-Finnhub-Token` header rather than the query
/// string so it never shows up in request logs.
pub struct FinnhubProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider. A missing key is reported on first use.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http::build_client(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different host (proxy, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_key(&self) -> Result<&str, MarketDataError> {
        self.api_key.as_deref().ok_or_else(|| {
            MarketDataError::configuration(PROVIDER_ID, "FINNHUB_API_KEY is not configured")
        })
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, MarketDataError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.base_url, endpoint);

        let request = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", api_key)
            .query(params);

        debug!("Finnhub request: {} {:?}", endpoint, params);

        let (status, body) = http::send(PROVIDER_ID, request).await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::rate_limited(PROVIDER_ID, "HTTP 429"));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(MarketDataError::upstream(
                PROVIDER_ID,
                "Invalid or missing API key",
            ));
        }

        // Finnhub answers 403 once the plan quota is used up
        if status == StatusCode::FORBIDDEN {
            return Err(MarketDataError::rate_limited(
                PROVIDER_ID,
                error_message(&body).unwrap_or_else(|| "HTTP 403".to_string()),
            ));
        }

        if !status.is_success() {
            let message =
                error_message(&body).unwrap_or_else(|| format!("HTTP {} - {}", status, body));
            return Err(MarketDataError::upstream(PROVIDER_ID, message));
        }

        Ok(body)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        resolution: &str,
        lookback_days: i64,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(lookback_days);
        let from_ts = from.timestamp().to_string();
        let to_ts = to.timestamp().to_string();

        let params = [
            ("symbol", symbol),
            ("resolution", resolution),
            ("from", from_ts.as_str()),
            ("to", to_ts.as_str()),
        ];

        let text = self.fetch("/stock/candle", &params).await?;
        let candles = parse_candles(symbol, &text)?;

        debug!(
            "Finnhub: fetched {} candles for {} (resolution {})",
            candles.len(),
            symbol,
            resolution
        );

        Ok(candles)
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_fundamentals: true,
            reports_quote_volume: false,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60, // Free tier limit
            requests_per_day: None,
            burst: 10,
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from Finnhub", symbol);
        let text = self.fetch("/quote", &[("symbol", symbol)]).await?;
        parse_quote(symbol, &text)
    }

    async fn get_intraday_data(
        &self,
        symbol: &str,
        interval: IntradayInterval,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let resolution = interval.minutes().to_string();
        self.fetch_candles(symbol, &resolution, INTRADAY_LOOKBACK_DAYS)
            .await
    }

    async fn get_daily_data(
        &self,
        symbol: &str,
        outputsize: OutputSize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let lookback = match outputsize {
            OutputSize::Compact => COMPACT_LOOKBACK_DAYS,
            OutputSize::Full => FULL_LOOKBACK_DAYS,
        };
        self.fetch_candles(symbol, "D", lookback).await
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        debug!("Fetching profile for {} from Finnhub", symbol);
        let text = self.fetch("/stock/profile2", &[("symbol", symbol)]).await?;
        parse_profile(&text)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok().map(|d| d.normalize())
}

fn parse_quote(symbol: &str, text: &str) -> Result<Quote, MarketDataError> {
    let response: QuoteResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse quote response: {}", e))
    })?;

    let price = response.c.unwrap_or(0.0);
    let previous_close = response.pc.unwrap_or(0.0);

    // Finnhub returns zeros for unknown symbols instead of an error
    if price == 0.0 && previous_close == 0.0 {
        return Err(MarketDataError::no_data(symbol, "quote is empty"));
    }

    let price_dec = to_decimal(price).ok_or_else(|| {
        MarketDataError::upstream(PROVIDER_ID, format!("Invalid price: {}", price))
    })?;
    let previous_close_dec = to_decimal(previous_close).unwrap_or(Decimal::ZERO);

    let change = response
        .d
        .and_then(to_decimal)
        .unwrap_or(price_dec - previous_close_dec);

    let change_percent = response
        .dp
        .and_then(to_decimal)
        .or_else(|| {
            (!previous_close_dec.is_zero())
                .then(|| change / previous_close_dec * Decimal::ONE_HUNDRED)
        })
        .unwrap_or(Decimal::ZERO);

    let latest_trading_day = response
        .t
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now)
        .date_naive();

    Ok(Quote {
        symbol: symbol.to_string(),
        price: price_dec,
        change,
        change_percent: Quote::format_change_percent(change_percent),
        volume: None, // /quote endpoint doesn't provide volume
        latest_trading_day,
        previous_close: previous_close_dec,
        open: response.o.and_then(to_decimal).unwrap_or(price_dec),
        high: response.h.and_then(to_decimal).unwrap_or(price_dec),
        low: response.l.and_then(to_decimal).unwrap_or(price_dec),
        fundamentals: Fundamentals::default(),
    })
}

fn parse_candles(symbol: &str, text: &str) -> Result<Vec<Candle>, MarketDataError> {
    let response: CandleResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse candle response: {}", e))
    })?;

    if response.s == "no_data" {
        return Err(MarketDataError::no_data(symbol, "candle status no_data"));
    }

    if response.s != "ok" {
        return Err(MarketDataError::upstream(
            PROVIDER_ID,
            format!("Unexpected candle status: {}", response.s),
        ));
    }

    // Validate array lengths match
    let len = response.t.len();
    if response.c.len() != len
        || response.o.len() != len
        || response.h.len() != len
        || response.l.len() != len
    {
        return Err(MarketDataError::upstream(
            PROVIDER_ID,
            "Mismatched array lengths in candle response",
        ));
    }

    let mut candles = Vec::with_capacity(len);

    for i in 0..len {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            to_decimal(response.o[i]),
            to_decimal(response.h[i]),
            to_decimal(response.l[i]),
            to_decimal(response.c[i]),
        ) else {
            warn!("Skipping invalid candle at index {} for {}", i, symbol);
            continue;
        };

        let volume = response.v.get(i).copied().unwrap_or(0.0).max(0.0) as u64;
        candles.push(Candle::new(response.t[i], open, high, low, close, volume));
    }

    if candles.is_empty() {
        return Err(MarketDataError::no_data(symbol, "candle series is empty"));
    }

    sort_candles(&mut candles);
    Ok(candles)
}

fn parse_profile(text: &str) -> Result<Fundamentals, MarketDataError> {
    // Unknown symbols come back as an empty object
    if text.trim() == "{}" {
        return Ok(Fundamentals::default());
    }

    let response: ProfileResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse profile response: {}", e))
    })?;

    if response.ticker.is_none() {
        return Ok(Fundamentals::default());
    }

    let millions = Decimal::from(1_000_000);

    Ok(Fundamentals {
        market_cap: response
            .market_capitalization
            .filter(|v| *v > 0.0)
            .and_then(to_decimal)
            .map(|mc| (mc * millions).round()),
        shares_outstanding: response
            .share_outstanding
            .filter(|v| *v > 0.0)
            .and_then(to_decimal)
            .and_then(|s| (s * millions).round().to_u64()),
        exchange: response.exchange.filter(|e| !e.trim().is_empty()),
        ..Default::default()
    })
}

// ============================================================================
// Tests
// ============================================================================
