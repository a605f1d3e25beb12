//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Current quotes via GLOBAL_QUOTE
//! - Intraday candles via TIME_SERIES_INTRADAY
//! - Daily candles via TIME_SERIES_DAILY
//! - Company fundamentals via OVERVIEW
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and
//! 25 per day, and reports quota exhaustion in the body of a 200 response.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{sort_candles, Candle, Fundamentals, IntradayInterval, OutputSize, Quote};
use crate::provider::http;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const PROVIDER_NAME: &str = "alphavantage";

/// Exchange time zone assumed when the intraday payload does not name one.
const DEFAULT_EXCHANGE_TZ: Tz = chrono_tz::US::Eastern;

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Body-level error fields every Alpha Vantage function may return.
#[derive(Debug, Default, Deserialize)]
struct ApiNotices {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notices: ApiNotices,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// TIME_SERIES_INTRADAY / TIME_SERIES_DAILY response.
///
/// The series key depends on the function and interval
/// (`Time Series (5min)`, `Time Series (Daily)`), so it is captured through
/// the flattened map and looked up by name.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Meta Data")]
    meta_data: Option<HashMap<String, String>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    series: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SeriesBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// OVERVIEW response for company fundamentals.
/// Only includes the fields a quote carries; the API returns many more.
#[derive(Debug, Deserialize)]
struct CompanyOverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Exchange")]
    exchange: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_capitalization: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "PriceToBookRatio")]
    price_to_book: Option<String>,
    #[serde(rename = "EPS")]
    eps: Option<String>,
    #[serde(rename = "SharesOutstanding")]
    shares_outstanding: Option<String>,
    #[serde(rename = "52WeekHigh")]
    week_52_high: Option<String>,
    #[serde(rename = "52WeekLow")]
    week_52_low: Option<String>,
    #[serde(flatten)]
    notices: ApiNotices,
}

impl CompanyOverviewResponse {
    fn to_fundamentals(&self) -> Fundamentals {
        Fundamentals {
            market_cap: parse_field(&self.market_capitalization),
            pe_ratio: parse_field(&self.pe_ratio),
            pb_ratio: parse_field(&self.price_to_book),
            eps: parse_field(&self.eps),
            shares_outstanding: sentinel_filter(&self.shares_outstanding)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0),
            week_52_high: parse_field(&self.week_52_high),
            week_52_low: parse_field(&self.week_52_low),
            exchange: sentinel_filter(&self.exchange).map(str::to_string),
        }
    }
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider. A missing key is reported on first use.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http::build_client(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different endpoint (proxy, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&str, MarketDataError> {
        self.api_key.as_deref().ok_or_else(|| {
            MarketDataError::configuration(PROVIDER_ID, "ALPHA_VANTAGE_API_KEY is not configured")
        })
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let api_key = self.api_key()?;

        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::configuration(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(api_key, &http::mask_secret(api_key))
        );

        let (status, body) = http::send(PROVIDER_ID, self.client.get(url)).await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::rate_limited(PROVIDER_ID, "HTTP 429"));
        }

        if !status.is_success() {
            return Err(MarketDataError::upstream(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }

        Ok(body)
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        params: &[(&str, &str)],
        series_key: &str,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let text = self.fetch(params).await?;
        let candles = parse_time_series(symbol, &text, series_key)?;

        debug!(
            "Alpha Vantage: fetched {} candles for {} from '{}'",
            candles.len(),
            symbol,
            series_key
        );

        Ok(candles)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_fundamentals: true,
            reports_quote_volume: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5,
            requests_per_day: Some(25),
            burst: 5,
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from Alpha Vantage", symbol);
        let text = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        parse_global_quote(symbol, &text)
    }

    async fn get_intraday_data(
        &self,
        symbol: &str,
        interval: IntradayInterval,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let series_key = format!("Time Series ({})", interval);
        let params = [
            ("function", "TIME_SERIES_INTRADAY"),
            ("symbol", symbol),
            ("interval", interval.as_str()),
            ("outputsize", "compact"),
        ];
        self.fetch_series(symbol, &params, &series_key).await
    }

    async fn get_daily_data(
        &self,
        symbol: &str,
        outputsize: OutputSize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol),
            ("outputsize", outputsize.as_str()),
        ];
        self.fetch_series(symbol, &params, "Time Series (Daily)")
            .await
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        debug!("Fetching overview for {} from Alpha Vantage", symbol);
        let text = self
            .fetch(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;
        parse_overview(&text)
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Check for API-level errors in the response.
fn check_api_error(
    error_message: &Option<String>,
    note: &Option<String>,
    information: &Option<String>,
) -> Result<(), MarketDataError> {
    if let Some(ref msg) = error_message {
        return Err(MarketDataError::upstream(PROVIDER_ID, msg.clone()));
    }

    // "Note" usually indicates rate limiting
    if let Some(ref msg) = note {
        if is_rate_limit_notice(msg) {
            return Err(MarketDataError::rate_limited(PROVIDER_ID, msg.clone()));
        }
        warn!("Alpha Vantage note: {}", msg);
    }

    // "Information" replaces the payload: quota notices, premium-only endpoints
    if let Some(ref msg) = information {
        if is_rate_limit_notice(msg) {
            return Err(MarketDataError::rate_limited(PROVIDER_ID, msg.clone()));
        }
        return Err(MarketDataError::upstream(PROVIDER_ID, msg.clone()));
    }

    Ok(())
}

fn is_rate_limit_notice(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("call frequency") || lower.contains("rate limit")
}

/// Drop the placeholders Alpha Vantage uses for missing values.
fn sentinel_filter(s: &Option<String>) -> Option<&str> {
    s.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "None" && *v != "-" && *v != "N/A")
}

fn parse_field(s: &Option<String>) -> Option<Decimal> {
    sentinel_filter(s).and_then(parse_decimal)
}

/// Parse a decimal value from a string.
fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok()
}

/// Parse a date string in YYYY-MM-DD format to Unix seconds at 00:00 UTC.
fn parse_date(date_str: &str) -> Option<i64> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
}

/// Parse an intraday timestamp expressed in the exchange's local time.
fn parse_intraday_timestamp(ts: &str, tz: Tz) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Normalize `"1.0084%"` to `"1.01%"`; anything unparseable passes through.
fn normalize_change_percent(raw: &str) -> String {
    parse_decimal(raw.trim().trim_end_matches('%'))
        .map(Quote::format_change_percent)
        .unwrap_or_else(|| raw.trim().to_string())
}

fn parse_global_quote(symbol: &str, text: &str) -> Result<Quote, MarketDataError> {
    let response: GlobalQuoteResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse quote response: {}", e))
    })?;

    check_api_error(
        &response.notices.error_message,
        &response.notices.note,
        &response.notices.information,
    )?;

    // An empty "Global Quote" object means the symbol is unknown
    let quote = response.global_quote.unwrap_or_default();
    let price = quote
        .price
        .as_deref()
        .and_then(parse_decimal)
        .ok_or_else(|| MarketDataError::no_data(symbol, "Global Quote is empty"))?;

    let previous_close = quote
        .previous_close
        .as_deref()
        .and_then(parse_decimal)
        .unwrap_or(price);
    let change = quote
        .change
        .as_deref()
        .and_then(parse_decimal)
        .unwrap_or(price - previous_close);
    let change_percent = quote
        .change_percent
        .as_deref()
        .map(normalize_change_percent)
        .unwrap_or_else(|| Quote::format_change_percent(Decimal::ZERO));

    let latest_trading_day = quote
        .latest_trading_day
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Utc::now().date_naive());

    Ok(Quote {
        symbol: quote.symbol.unwrap_or_else(|| symbol.to_string()),
        price,
        change,
        change_percent,
        volume: quote.volume.as_deref().and_then(|v| v.trim().parse().ok()),
        latest_trading_day,
        previous_close,
        open: quote.open.as_deref().and_then(parse_decimal).unwrap_or(price),
        high: quote.high.as_deref().and_then(parse_decimal).unwrap_or(price),
        low: quote.low.as_deref().and_then(parse_decimal).unwrap_or(price),
        fundamentals: Fundamentals::default(),
    })
}

fn parse_time_series(
    symbol: &str,
    text: &str,
    series_key: &str,
) -> Result<Vec<Candle>, MarketDataError> {
    let mut response: TimeSeriesResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;

    check_api_error(
        &response.error_message,
        &response.note,
        &response.information,
    )?;

    let raw = response
        .series
        .remove(series_key)
        .ok_or_else(|| MarketDataError::no_data(symbol, format!("'{}' missing", series_key)))?;

    let bars: HashMap<String, SeriesBar> = serde_json::from_value(raw).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Malformed '{}': {}", series_key, e))
    })?;

    let tz = response
        .meta_data
        .as_ref()
        .and_then(|meta| {
            meta.iter()
                .find(|(k, _)| k.ends_with("Time Zone"))
                .map(|(_, v)| v)
        })
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(DEFAULT_EXCHANGE_TZ);

    let mut candles: Vec<Candle> = bars
        .into_iter()
        .filter_map(|(stamp, bar)| {
            let time = if stamp.len() > 10 {
                parse_intraday_timestamp(&stamp, tz)
            } else {
                parse_date(&stamp)
            };
            let Some(time) = time else {
                warn!("Alpha Vantage: skipping bar with bad timestamp '{}'", stamp);
                return None;
            };

            Some(Candle::new(
                time,
                parse_decimal(&bar.open)?,
                parse_decimal(&bar.high)?,
                parse_decimal(&bar.low)?,
                parse_decimal(&bar.close)?,
                bar.volume.trim().parse().ok()?,
            ))
        })
        .collect();

    if candles.is_empty() {
        return Err(MarketDataError::no_data(
            symbol,
            format!("'{}' is empty", series_key),
        ));
    }

    // Sort by timestamp ascending
    sort_candles(&mut candles);
    Ok(candles)
}

fn parse_overview(text: &str) -> Result<Fundamentals, MarketDataError> {
    let response: CompanyOverviewResponse = serde_json::from_str(text).map_err(|e| {
        MarketDataError::upstream(PROVIDER_ID, format!("Failed to parse overview: {}", e))
    })?;

    check_api_error(
        &response.notices.error_message,
        &response.notices.note,
        &response.notices.information,
    )?;

    if response.symbol.is_none() {
        return Ok(Fundamentals::default());
    }

    Ok(response.to_fundamentals())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-05"), Some(1704412800));
        assert_eq!(parse_date("invalid"), None);
    }

    #[test]
    fn test_parse_intraday_timestamp_uses_exchange_zone() {
        // 16:00 New York in January is 21:00 UTC
        assert_eq!(
            parse_intraday_timestamp("2024-01-05 16:00:00", chrono_tz::US::Eastern),
            Some(1704488400)
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("150.25"), Some(dec!(150.25)));
        assert_eq!(parse_decimal("not a number"), None);
    }

    #[test]
    fn test_provider_identity() {
        let provider = AlphaVantageProvider::new(Some("key".to_string()));
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
        assert_eq!(provider.name(), "alphavantage");
        assert!(provider.rate_limit().is_quota_scarce());
        assert!(!AlphaVantageProvider::new(None).is_configured());
    }

    #[test]
    fn test_global_quote_parsing() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "161.0000",
                "03. high": "162.5000",
                "04. low": "160.2000",
                "05. price": "162.0000",
                "06. volume": "3462193",
                "07. latest trading day": "2024-01-05",
                "08. previous close": "160.5000",
                "09. change": "1.5000",
                "10. change percent": "0.9346%"
            }
        }"#;

        let quote = parse_global_quote("IBM", json).unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, dec!(162));
        assert_eq!(quote.change, dec!(1.5));
        assert_eq!(quote.change, quote.price - quote.previous_close);
        assert_eq!(quote.change_percent, "0.93%");
        assert_eq!(quote.volume, Some(3_462_193));
        assert_eq!(quote.latest_trading_day.to_string(), "2024-01-05");
    }

    #[test]
    fn test_empty_global_quote_is_no_data() {
        let err = parse_global_quote("NOPE", r#"{"Global Quote": {}}"#).unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
    }

    #[test]
    fn test_missing_daily_series_is_no_data() {
        let json = r#"{"Meta Data": {"2. Symbol": "IBM"}}"#;
        let err = parse_time_series("IBM", json, "Time Series (Daily)").unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
    }

    #[test]
    fn test_daily_series_sorted_ascending() {
        let json = r#"{
            "Meta Data": {"2. Symbol": "IBM", "5. Time Zone": "US/Eastern"},
            "Time Series (Daily)": {
                "2024-01-05": {"1. open": "160.0", "2. high": "162.0", "3. low": "159.5", "4. close": "161.5", "5. volume": "4000000"},
                "2024-01-03": {"1. open": "158.0", "2. high": "159.0", "3. low": "157.0", "4. close": "158.5", "5. volume": "3000000"},
                "2024-01-04": {"1. open": "158.5", "2. high": "160.5", "3. low": "158.0", "4. close": "160.0", "5. volume": "3500000"}
            }
        }"#;

        let candles = parse_time_series("IBM", json, "Time Series (Daily)").unwrap();
        let times: Vec<i64> = candles.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![1704240000, 1704326400, 1704412800]);
        assert_eq!(candles[2].close, dec!(161.5));
        assert_eq!(candles[0].volume, 3_000_000);
    }

    #[test]
    fn test_intraday_series_key_and_zone() {
        let json = r#"{
            "Meta Data": {"1. Information": "Intraday (5min)", "6. Time Zone": "US/Eastern"},
            "Time Series (5min)": {
                "2024-01-05 16:00:00": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "10"}
            }
        }"#;

        let candles = parse_time_series("IBM", json, "Time Series (5min)").unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].time, 1704488400);
    }

    #[test]
    fn test_rate_limit_notice() {
        let json = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_time_series("IBM", json, "Time Series (Daily)").unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));

        let json = r#"{"Information": "Our standard API rate limit is 25 requests per day."}"#;
        let err = parse_global_quote("IBM", json).unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_error_message_is_upstream() {
        let json = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err = parse_time_series("XXXX", json, "Time Series (Daily)").unwrap_err();
        assert!(matches!(err, MarketDataError::Upstream { .. }));
    }

    #[test]
    fn test_overview_sentinels_become_none() {
        let json = r#"{
            "Symbol": "IBM",
            "Exchange": "NYSE",
            "MarketCapitalization": "148000000000",
            "PERatio": "None",
            "PriceToBookRatio": "-",
            "EPS": "8.14",
            "SharesOutstanding": "0",
            "52WeekHigh": "166.34",
            "52WeekLow": "120.55"
        }"#;

        let fundamentals = parse_overview(json).unwrap();
        assert_eq!(fundamentals.market_cap, Some(dec!(148000000000)));
        assert!(fundamentals.pe_ratio.is_none());
        assert!(fundamentals.pb_ratio.is_none());
        assert_eq!(fundamentals.eps, Some(dec!(8.14)));
        assert!(fundamentals.shares_outstanding.is_none());
        assert_eq!(fundamentals.week_52_high, Some(dec!(166.34)));
        assert_eq!(fundamentals.exchange.as_deref(), Some("NYSE"));
    }

    #[test]
    fn test_overview_without_symbol_is_empty() {
        assert!(parse_overview("{}").unwrap().is_empty());
    }
}
