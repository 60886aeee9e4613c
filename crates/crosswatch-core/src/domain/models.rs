use serde::{Deserialize, Serialize};

use crate::{Symbol, Timeframe, UtcDateTime, ValidationError};

/// OHLCV bar for one kline interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume", volume)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Time-ordered bars for one symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Rejects series whose timestamps are not strictly increasing.
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        bars: Vec<PriceBar>,
    ) -> Result<Self, ValidationError> {
        if let Some(index) = bars
            .windows(2)
            .position(|pair| pair[1].ts <= pair[0].ts)
        {
            return Err(ValidationError::NonIncreasingTimestamp { index: index + 1 });
        }

        Ok(Self {
            symbol,
            timeframe,
            bars,
        })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
