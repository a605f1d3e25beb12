//! Deterministic synthetic quotes and candle series.
//!
//! Nothing here touches the network, the cache, or the wall clock beyond the
//! trading-day date and the default series anchor. Every number is drawn
//! from a PRNG seeded by the symbol plus a fixed per-field offset, so a
//! symbol always produces the same quote and, for a given anchor, the same
//! series.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::models::{Candle, Fundamentals, Quote};
use crate::period::Period;

const WALK_OFFSET: u64 = 100;
const OPEN_OFFSET: u64 = 1000;
const HIGH_OFFSET: u64 = 2000;
const LOW_OFFSET: u64 = 3000;
const VOLUME_OFFSET: u64 = 4000;

/// 32-bit rolling hash over UTF-16 code units (`h = h * 31 + c`), made
/// non-negative. The empty symbol hashes to 0.
pub fn symbol_seed(symbol: &str) -> u64 {
    let hash = symbol
        .encode_utf16()
        .fold(0i32, |h, unit| {
            (h << 5).wrapping_sub(h).wrapping_add(i32::from(unit))
        });
    u64::from(hash.unsigned_abs())
}

/// Independent uniform draws keyed by offset from one seed.
#[derive(Clone, Copy, Debug)]
pub struct SeededDraws {
    seed: u64,
}

impl SeededDraws {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self::new(symbol_seed(symbol))
    }

    /// Uniform value in `[0, 1)`.
    pub fn draw(&self, offset: u64) -> f64 {
        StdRng::seed_from_u64(self.seed.wrapping_add(offset)).gen::<f64>()
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(4)
        .normalize()
}

fn to_decimal_dp(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(dp)
        .normalize()
}

/// Synthetic quote dated today (UTC).
pub fn mock_quote(symbol: &str) -> Quote {
    mock_quote_on(symbol, Utc::now().date_naive())
}

/// Synthetic quote for `symbol` with a fixed trading day.
///
/// Price lies in `[1, 500)`, the day's change within ±5 %, volume within
/// 1M..10M. Market cap, shares outstanding and exchange are never
/// synthesized.
pub fn mock_quote_on(symbol: &str, trading_day: NaiveDate) -> Quote {
    let r = SeededDraws::for_symbol(symbol);

    let base_price = 1.0 + r.draw(0) * 499.0;
    let change_percent = (r.draw(1) - 0.5) * 10.0;
    let change = base_price * change_percent / 100.0;
    let previous_close = base_price - change;

    let day_volatility = base_price * 0.02;
    let open = previous_close + (r.draw(2) - 0.5) * day_volatility;
    let high = open.max(base_price) + r.draw(3) * day_volatility;
    let low = open.min(base_price) - r.draw(4) * day_volatility;
    let volume = 1_000_000 + (r.draw(5) * 9_000_000.0) as u64;

    let week_52_high = base_price + r.draw(6) * base_price * 0.5;
    let week_52_low = base_price - r.draw(7) * base_price * 0.3;

    let pb_ratio = (r.draw(8) < 0.7).then(|| to_decimal_dp(0.5 + r.draw(9) * 5.0, 2));
    let pe_ratio = (r.draw(10) < 0.6).then(|| Decimal::from((5.0 + r.draw(11) * 50.0) as u64));
    let eps = (r.draw(12) < 0.6).then(|| to_decimal_dp(r.draw(13) * 10.0, 2));

    let price = to_decimal(base_price);
    let change = to_decimal(change);
    let open = to_decimal(open);

    Quote {
        symbol: symbol.to_string(),
        price,
        change,
        change_percent: Quote::format_change_percent(to_decimal(change_percent)),
        volume: Some(volume),
        latest_trading_day: trading_day,
        previous_close: price - change,
        high: to_decimal(high).max(price).max(open),
        low: to_decimal(low).min(price).min(open),
        open,
        fundamentals: Fundamentals {
            pe_ratio,
            pb_ratio,
            eps,
            week_52_high: Some(to_decimal(week_52_high)),
            week_52_low: Some(to_decimal(week_52_low)),
            ..Default::default()
        },
    }
}

/// Number of steps and step length (seconds) of a synthetic series.
fn series_shape(period: Period) -> (i64, i64) {
    match period {
        Period::TenDays => (48, 5 * 60),
        Period::OneMonth => (30, 86_400),
        Period::ThreeMonths => (90, 86_400),
        Period::SixMonths => (180, 86_400),
        Period::OneYear => (365, 86_400),
        Period::FiveYears | Period::All => (1825, 86_400),
    }
}

/// Synthetic series ending at today's 00:00 UTC.
pub fn mock_series(symbol: &str, period: Period) -> Vec<Candle> {
    let anchor = Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    mock_series_at(symbol, period, anchor)
}

/// Synthetic series of `steps + 1` candles, oldest first, the last one at
/// `anchor`.
///
/// The closes follow a random walk from a historical price between 70 % and
/// 130 % of the quote price, drifting toward it, and the last close is the
/// quote price exactly.
pub fn mock_series_at(symbol: &str, period: Period, anchor: DateTime<Utc>) -> Vec<Candle> {
    let r = SeededDraws::for_symbol(symbol);
    let quote = mock_quote_on(symbol, anchor.date_naive());
    let current = 1.0 + r.draw(0) * 499.0;

    let (steps, spacing) = series_shape(period);
    let start = current * (0.7 + r.draw(WALK_OFFSET) * 0.6);
    let drift = (current - start) / steps as f64;

    let mut price = start;
    let mut candles = Vec::with_capacity(steps as usize + 1);

    for i in (0..=steps).rev() {
        let offset = i as u64;
        price += drift + (r.draw(offset) - 0.5) * current * 0.02;
        price = price.max(0.01);

        let close = if i == 0 { quote.price } else { to_decimal(price) };
        let close_f = if i == 0 { current } else { price };
        let volatility = close_f * 0.02;

        let open = to_decimal(close_f + (r.draw(offset + OPEN_OFFSET) - 0.5) * volatility);
        let high = to_decimal(close_f + r.draw(offset + HIGH_OFFSET) * volatility)
            .max(open)
            .max(close);
        let low = to_decimal(close_f - r.draw(offset + LOW_OFFSET) * volatility)
            .min(open)
            .min(close);
        let volume = 1_000_000 + (r.draw(offset + VOLUME_OFFSET) * 5_000_000.0) as u64;

        candles.push(Candle::new(
            anchor.timestamp() - i * spacing,
            open,
            high,
            low,
            close,
            volume,
        ));
    }

    candles
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_symbol_seed() {
        assert_eq!(symbol_seed(""), 0);
        // 'A' = 65, 'AB' = 65 * 31 + 66
        assert_eq!(symbol_seed("A"), 65);
        assert_eq!(symbol_seed("AB"), 2081);
        assert_ne!(symbol_seed("AAPL"), symbol_seed("MSFT"));
    }

    #[test]
    fn test_seed_wraps_without_panicking() {
        let long = "Z".repeat(64);
        let _ = symbol_seed(&long);
        let _ = symbol_seed("日本株式");
    }

    #[test]
    fn test_draws_are_stable_and_in_range() {
        let a = SeededDraws::new(42);
        let b = SeededDraws::new(42);
        for offset in 0..50 {
            let x = a.draw(offset);
            assert_eq!(x, b.draw(offset));
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_quote_is_deterministic() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(mock_quote_on("AAPL", day), mock_quote_on("AAPL", day));
        assert_ne!(
            mock_quote_on("AAPL", day).price,
            mock_quote_on("TSLA", day).price
        );
    }

    #[test]
    fn test_quote_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        for symbol in ["AAPL", "MSFT", "", "BRK.B", "x"] {
            let q = mock_quote_on(symbol, day);
            assert!(q.price >= Decimal::ONE && q.price < Decimal::from(500));
            assert_eq!(q.previous_close, q.price - q.change);
            assert!(q.low <= q.open && q.open <= q.high);
            assert!(q.low <= q.price && q.price <= q.high);
            let volume = q.volume.unwrap();
            assert!((1_000_000..10_000_000).contains(&volume));
            assert!(q.change_percent.ends_with('%'));
            assert!(q.fundamentals.market_cap.is_none());
            assert!(q.fundamentals.shares_outstanding.is_none());
            assert!(q.fundamentals.exchange.is_none());
            assert!(q.fundamentals.week_52_low <= q.fundamentals.week_52_high);
        }
    }

    #[test]
    fn test_series_ends_at_quote_price() {
        let anchor = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let quote = mock_quote_on("NVDA", anchor.date_naive());

        for period in Period::ALL {
            let series = mock_series_at("NVDA", period, anchor);
            let last = series.last().unwrap();
            assert_eq!(last.close, quote.price, "{}", period);
            assert_eq!(last.time, anchor.timestamp());
            assert!(series.iter().all(Candle::is_consistent), "{}", period);
            assert!(series.windows(2).all(|w| w[0].time < w[1].time));
        }
    }

    #[test]
    fn test_series_lengths_and_spacing() {
        let anchor = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();

        let intraday = mock_series_at("AMD", Period::TenDays, anchor);
        assert_eq!(intraday.len(), 49);
        assert_eq!(intraday[1].time - intraday[0].time, 300);

        let yearly = mock_series_at("AMD", Period::OneYear, anchor);
        assert_eq!(yearly.len(), 366);
        assert_eq!(yearly[1].time - yearly[0].time, 86_400);

        assert_eq!(mock_series_at("AMD", Period::All, anchor).len(), 1826);
    }

    #[test]
    fn test_series_is_deterministic() {
        let anchor = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(
            mock_series_at("GOOG", Period::SixMonths, anchor),
            mock_series_at("GOOG", Period::SixMonths, anchor)
        );
    }
}
