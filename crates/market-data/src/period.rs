//! Period router: from a human-facing chart period to one provider call
//! plus a look-back window.
//!
//! | Period | Provider call            | Window     |
//! |--------|--------------------------|------------|
//! | 10D    | intraday, 5min           | 10 days    |
//! | 1M     | daily, compact           | 30 days    |
//! | 3M     | daily, compact           | 90 days    |
//! | 6M     | daily, compact           | 180 days   |
//! | 1Y     | daily, full              | 365 days   |
//! | 5Y     | daily, full              | 5×365 days |
//! | ALL    | daily, full              | unbounded  |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::MarketDataError;
use crate::models::{Candle, IntradayInterval, OutputSize};
use crate::provider::MarketDataProvider;

const DAY_SECS: u64 = 86_400;

/// Supported chart periods, shortest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "10D")]
    TenDays,
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "ALL")]
    All,
}

impl Period {
    pub const ALL: [Period; 7] = [
        Period::TenDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::FiveYears,
        Period::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::TenDays => "10D",
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::OneYear => "1Y",
            Period::FiveYears => "5Y",
            Period::All => "ALL",
        }
    }

    /// Look-back window, `None` for the whole history.
    pub fn window(self) -> Option<Duration> {
        let days = match self {
            Period::TenDays => 10,
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
            Period::FiveYears => 5 * 365,
            Period::All => return None,
        };
        Some(Duration::from_secs(days * DAY_SECS))
    }

    /// The single provider call that covers this period.
    pub fn series_request(self) -> SeriesRequest {
        match self {
            Period::TenDays => SeriesRequest::Intraday(IntradayInterval::FiveMinutes),
            Period::OneMonth | Period::ThreeMonths | Period::SixMonths => {
                SeriesRequest::Daily(OutputSize::Compact)
            }
            Period::OneYear | Period::FiveYears | Period::All => {
                SeriesRequest::Daily(OutputSize::Full)
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MarketDataError::InvalidRequest(format!("unknown period '{}'", wanted)))
    }
}

/// Provider method and parameter a period maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesRequest {
    Intraday(IntradayInterval),
    Daily(OutputSize),
}

impl SeriesRequest {
    pub async fn fetch(
        self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
    ) -> Result<Vec<Candle>, MarketDataError> {
        match self {
            SeriesRequest::Intraday(interval) => provider.get_intraday_data(symbol, interval).await,
            SeriesRequest::Daily(outputsize) => provider.get_daily_data(symbol, outputsize).await,
        }
    }
}

/// Resolved route for one period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodRoute {
    pub period: Period,
    pub request: SeriesRequest,
    pub window: Option<Duration>,
}

/// Route a period string. Unknown strings fall back to 1M with a warning.
pub fn route(period: &str) -> PeriodRoute {
    let period = period.parse().unwrap_or_else(|_| {
        warn!(
            "Unknown period '{}', using {}",
            period.trim(),
            Period::default()
        );
        Period::default()
    });
    PeriodRoute::from(period)
}

impl From<Period> for PeriodRoute {
    fn from(period: Period) -> Self {
        Self {
            period,
            request: period.series_request(),
            window: period.window(),
        }
    }
}

impl PeriodRoute {
    /// Run the provider call this route selects. The result is unfiltered.
    pub async fn fetch(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.request.fetch(provider, symbol).await
    }

    /// Earliest candle time kept when filtering at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<i64> {
        self.window
            .map(|window| now.timestamp() - window.as_secs() as i64)
    }

    /// Keep candles with `time >= now - window`. Order is preserved.
    pub fn filter(&self, candles: Vec<Candle>, now: DateTime<Utc>) -> Vec<Candle> {
        match self.cutoff(now) {
            Some(cutoff) => candles.into_iter().filter(|c| c.time >= cutoff).collect(),
            None => candles,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn candle(time: i64) -> Candle {
        Candle::new(time, dec!(10), dec!(11), dec!(9), dec!(10.5), 100)
    }

    #[test]
    fn test_route_table() {
        assert_eq!(
            route("10D").request,
            SeriesRequest::Intraday(IntradayInterval::FiveMinutes)
        );
        for p in ["1M", "3M", "6M"] {
            assert_eq!(route(p).request, SeriesRequest::Daily(OutputSize::Compact));
        }
        for p in ["1Y", "5Y", "ALL"] {
            assert_eq!(route(p).request, SeriesRequest::Daily(OutputSize::Full));
        }
    }

    #[test]
    fn test_unknown_period_falls_back_to_one_month() {
        let fallback = route("2W");
        assert_eq!(fallback, route("1M"));
        assert_eq!(fallback.window, Some(Duration::from_secs(30 * 86_400)));
    }

    #[test]
    fn test_parsing_is_case_insensitive() {
        assert_eq!(route("all").period, Period::All);
        assert_eq!(route(" 5y ").period, Period::FiveYears);
        assert!("quarterly".parse::<Period>().is_err());
    }

    #[test]
    fn test_periods_are_ordered() {
        let mut sorted = Period::ALL;
        sorted.sort();
        assert_eq!(sorted, Period::ALL);
        assert!(Period::TenDays < Period::All);
    }

    #[test]
    fn test_filter_keeps_window_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let cutoff = now.timestamp() - 10 * 86_400;
        let candles = vec![candle(cutoff - 1), candle(cutoff), candle(cutoff + 60)];

        let kept = route("10D").filter(candles, now);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].time, cutoff);
    }

    #[test]
    fn test_all_is_unfiltered() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let candles = vec![candle(0), candle(1)];
        assert_eq!(route("ALL").filter(candles, now).len(), 2);
        assert!(route("ALL").cutoff(now).is_none());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Period::TenDays).unwrap(), "\"10D\"");
        let p: Period = serde_json::from_str("\"6M\"").unwrap();
        assert_eq!(p, Period::SixMonths);
    }
}
