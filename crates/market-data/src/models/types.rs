use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Bucket width for intraday candle series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntradayInterval {
    #[serde(rename = "1min")]
    OneMinute,
    #[default]
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "60min")]
    SixtyMinutes,
}

impl IntradayInterval {
    pub const ALL: [IntradayInterval; 5] = [
        IntradayInterval::OneMinute,
        IntradayInterval::FiveMinutes,
        IntradayInterval::FifteenMinutes,
        IntradayInterval::ThirtyMinutes,
        IntradayInterval::SixtyMinutes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntradayInterval::OneMinute => "1min",
            IntradayInterval::FiveMinutes => "5min",
            IntradayInterval::FifteenMinutes => "15min",
            IntradayInterval::ThirtyMinutes => "30min",
            IntradayInterval::SixtyMinutes => "60min",
        }
    }

    pub fn minutes(self) -> u32 {
        match self {
            IntradayInterval::OneMinute => 1,
            IntradayInterval::FiveMinutes => 5,
            IntradayInterval::FifteenMinutes => 15,
            IntradayInterval::ThirtyMinutes => 30,
            IntradayInterval::SixtyMinutes => 60,
        }
    }
}

impl fmt::Display for IntradayInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntradayInterval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        IntradayInterval::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .ok_or_else(|| {
                MarketDataError::InvalidRequest(format!(
                    "unsupported interval '{}', expected one of 1min, 5min, 15min, 30min, 60min",
                    s
                ))
            })
    }
}

/// How much daily history to request.
///
/// `Compact` is roughly the last 100 sessions; `Full` is as much history as
/// the provider tier allows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    #[default]
    Compact,
    Full,
}

impl OutputSize {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSize {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            other => Err(MarketDataError::InvalidRequest(format!(
                "unsupported outputsize '{}', expected compact or full",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse() {
        assert_eq!(
            "5min".parse::<IntradayInterval>().unwrap(),
            IntradayInterval::FiveMinutes
        );
        assert_eq!(
            " 60MIN ".parse::<IntradayInterval>().unwrap(),
            IntradayInterval::SixtyMinutes
        );
        assert!("7min".parse::<IntradayInterval>().is_err());
    }

    #[test]
    fn test_interval_display_matches_wire_value() {
        for interval in IntradayInterval::ALL {
            assert_eq!(interval.to_string(), interval.as_str());
            let json = serde_json::to_string(&interval).unwrap();
            assert_eq!(json, format!("\"{}\"", interval.as_str()));
        }
    }

    #[test]
    fn test_output_size_parse() {
        assert_eq!("full".parse::<OutputSize>().unwrap(), OutputSize::Full);
        assert_eq!("Compact".parse::<OutputSize>().unwrap(), OutputSize::Compact);
        assert!(matches!(
            "huge".parse::<OutputSize>(),
            Err(MarketDataError::InvalidRequest(_))
        ));
    }
}
