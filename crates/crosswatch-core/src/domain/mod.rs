//! # Domain Models
//!
//! Validated value types shared by the signal engine and its collaborators.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PriceBar`] | OHLCV bar with timestamp |
//! | [`PriceSeries`] | Time-ordered bars for one symbol/timeframe |
//! | [`Symbol`] | Validated trading pair (`BTC/USDT`) |
//! | [`Timeframe`] | Kline interval (`1h`, `4h`, `1d`, ...) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Every type enforces its invariants at construction time, so an invalid
//! bar or an unordered series never reaches the indicator code.

mod models;
mod symbol;
mod timeframe;
mod timestamp;

pub use models::{PriceBar, PriceSeries};
pub use symbol::Symbol;
pub use timeframe::Timeframe;
pub use timestamp::UtcDateTime;
