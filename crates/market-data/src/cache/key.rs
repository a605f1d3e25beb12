use std::fmt;

use crate::models::{IntradayInterval, OutputSize};

/// Composite cache key: `stock:{kind}:{symbol}[:{param}]:{provider}`.
///
/// The provider segment keeps two providers from ever sharing an entry, and
/// the parameter segment does the same for intervals and output sizes.
/// Symbols are trimmed and upper-cased so `aapl` and `AAPL` share an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn quote(symbol: &str, provider: &str) -> Self {
        Self(format!(
            "stock:quote:{}:{}",
            normalize_symbol(symbol),
            provider
        ))
    }

    pub fn intraday(symbol: &str, interval: IntradayInterval, provider: &str) -> Self {
        Self(format!(
            "stock:intraday:{}:{}:{}",
            normalize_symbol(symbol),
            interval,
            provider
        ))
    }

    pub fn daily(symbol: &str, outputsize: OutputSize, provider: &str) -> Self {
        Self(format!(
            "stock:daily:{}:{}:{}",
            normalize_symbol(symbol),
            outputsize,
            provider
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
