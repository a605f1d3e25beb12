use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a time bucket.
///
/// `time` is the bucket start in Unix epoch seconds. Prices are decimals so
/// that values read from string-typed provider payloads survive unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start (Unix seconds)
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded volume for the bucket
    pub volume: u64,
}

impl Candle {
    pub fn new(
        time: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `low <= open, close <= high`.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Sort a series oldest first and drop repeated timestamps.
///
/// Upstream payloads are maps or parallel arrays whose order is not part of
/// their contract, so every adapter funnels its output through here. When a
/// timestamp repeats the first occurrence in the input wins.
pub fn sort_candles(candles: &mut Vec<Candle>) {
    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);
}
