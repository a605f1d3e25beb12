//! Market data models
//!
//! This module contains the canonical shapes every provider is normalized into:
//! - `candle` - OHLCV observations and the ordering helper all adapters share
//! - `quote` - Current quote plus the optional fundamentals block
//! - `types` - Request parameters (intraday interval, daily output size)

mod candle;
mod quote;
mod types;

pub use candle::{sort_candles, Candle};
pub use quote::{Fundamentals, Quote};
pub use types::{IntradayInterval, OutputSize};
