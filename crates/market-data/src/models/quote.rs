use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Company fundamentals that some providers attach to a quote.
///
/// Every field is optional. Provider placeholders such as `"None"`, `"-"` or
/// `"N/A"` are normalized to `None` by the adapters, so an unavailable value
/// and an unsupported one look the same to callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fundamentals {
    pub market_cap: Option<Decimal>,
    pub pe_ratio: Option<Decimal>,
    pub pb_ratio: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub shares_outstanding: Option<u64>,
    pub week_52_high: Option<Decimal>,
    pub week_52_low: Option<Decimal>,
    pub exchange: Option<String>,
}

impl Fundamentals {
    pub fn is_empty(&self) -> bool {
        *self == Fundamentals::default()
    }
}

/// Normalized current quote for a symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,

    /// Latest traded price
    pub price: Decimal,

    /// `price - previous_close`
    pub change: Decimal,

    /// Percent change formatted for display, e.g. `"1.23%"`
    pub change_percent: String,

    /// Session volume; `None` when the provider's quote endpoint omits it
    pub volume: Option<u64>,

    /// Session the quote belongs to
    pub latest_trading_day: NaiveDate,

    pub previous_close: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,

    #[serde(flatten)]
    pub fundamentals: Fundamentals,
}

impl Quote {
    /// Format a percent value the way quotes carry it.
    pub fn format_change_percent(percent: Decimal) -> String {
        format!("{:.2}%", percent)
    }

    /// Replace the fundamentals block, keeping price data untouched.
    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.fundamentals = fundamentals;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_quote() -> Quote {
        Quote {
            symbol: "AAPL".to_string(),
            price: dec!(150.25),
            change: dec!(1.50),
            change_percent: "1.01%".to_string(),
            volume: Some(52_000_000),
            latest_trading_day: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            previous_close: dec!(148.75),
            open: dec!(149.00),
            high: dec!(152.00),
            low: dec!(148.50),
            fundamentals: Fundamentals::default(),
        }
    }

    #[test]
    fn test_format_change_percent() {
        assert_eq!(Quote::format_change_percent(dec!(1.2345)), "1.23%");
        assert_eq!(Quote::format_change_percent(dec!(-0.5)), "-0.50%");
    }

    #[test]
    fn test_quote_serializes_camel_case_with_null_fundamentals() {
        let json = serde_json::to_value(sample_quote()).unwrap();

        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["changePercent"], "1.01%");
        assert_eq!(json["latestTradingDay"], "2024-01-05");
        assert_eq!(json["previousClose"], 148.75);
        assert!(json["marketCap"].is_null());
        assert!(json["week52High"].is_null());
        assert!(json["exchange"].is_null());
    }

    #[test]
    fn test_quote_deserializes_without_fundamental_keys() {
        let json = r#"{
            "symbol": "MSFT",
            "price": 370.1,
            "change": -2.3,
            "changePercent": "-0.62%",
            "volume": null,
            "latestTradingDay": "2024-01-05",
            "previousClose": 372.4,
            "open": 371.0,
            "high": 373.0,
            "low": 369.5
        }"#;

        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.price, dec!(370.1));
        assert!(quote.volume.is_none());
        assert!(quote.fundamentals.is_empty());
    }

    #[test]
    fn test_with_fundamentals() {
        let quote = sample_quote().with_fundamentals(Fundamentals {
            exchange: Some("NASDAQ".to_string()),
            ..Default::default()
        });
        assert_eq!(quote.fundamentals.exchange.as_deref(), Some("NASDAQ"));
        assert!(!quote.fundamentals.is_empty());
    }
}
