//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how often it may be called.

/// Describes the optional capabilities of a market data provider.
///
/// Quotes and both candle series are mandatory for every provider; only the
/// extras are listed here.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider can attach company fundamentals to a quote
    /// (one extra upstream request per quote).
    pub supports_fundamentals: bool,

    /// Whether the quote endpoint reports session volume.
    pub reports_quote_volume: bool,
}

/// Upstream quota for a provider tier.
///
/// `requests_per_minute` feeds the local token bucket. `requests_per_day`,
/// when set, is the figure TTL policy should be sized against: a tier with a
/// handful of calls per day cannot afford refreshes shorter than the
/// provider's own update cadence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum requests allowed per day, if the tier has a daily cap.
    pub requests_per_day: Option<u32>,

    /// Burst size the local limiter allows before throttling.
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_day: None,
            burst: 10,
        }
    }
}

impl RateLimit {
    /// True when the daily cap is small enough that every call matters.
    pub fn is_quota_scarce(&self) -> bool {
        self.requests_per_day.is_some_and(|n| n <= 500)
    }
}
