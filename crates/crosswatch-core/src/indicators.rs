//! Trend averages and momentum oscillator over a close-price series.
//!
//! * `fast_avg` / `slow_avg`: recursive EMA with `alpha = 2 / (period + 1)`,
//!   seeded with the first close. The recursion runs from the first bar but
//!   values are only reported from index `period - 1` onwards.
//! * `momentum`: RSI with Wilder smoothing (`alpha = 1 / period`) of the
//!   per-bar gains and losses, seeded with the first close-to-close change.
//!   The first `period` rows are undefined. A window with no losses reads 100.
//!
//! Known limitation: seeding with the first observation instead of a simple
//! average means the earliest reported values still carry seed bias. With a
//! window of a few hundred bars the bias has decayed long before the last
//! two rows, which are the only ones the classifier looks at.

use serde::{Deserialize, Serialize};

use crate::{InvalidInput, PriceBar, UtcDateTime};

/// Periods for the three indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub momentum_period: usize,
}

impl IndicatorParams {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        momentum_period: usize,
    ) -> Result<Self, InvalidInput> {
        let params = Self {
            fast_period,
            slow_period,
            momentum_period,
        };
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), InvalidInput> {
        for (name, period) in [
            ("fast_period", self.fast_period),
            ("slow_period", self.slow_period),
            ("momentum_period", self.momentum_period),
        ] {
            if period == 0 {
                return Err(InvalidInput::NonPositivePeriod { name });
            }
        }
        Ok(())
    }

    /// Index of the first row whose three columns are all defined.
    pub fn first_complete_row(&self) -> usize {
        self.fast_period
            .saturating_sub(1)
            .max(self.slow_period.saturating_sub(1))
            .max(self.momentum_period)
    }
}

/// A price bar extended with its indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: PriceBar,
    pub fast_avg: Option<f64>,
    pub slow_avg: Option<f64>,
    pub momentum: Option<f64>,
}

impl IndicatorRow {
    pub fn ts(&self) -> UtcDateTime {
        self.bar.ts
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    pub fn is_complete(&self) -> bool {
        self.fast_avg.is_some() && self.slow_avg.is_some() && self.momentum.is_some()
    }
}

/// Derives one [`IndicatorRow`] per input bar, preserving order.
pub fn compute(bars: &[PriceBar], params: &IndicatorParams) -> Result<Vec<IndicatorRow>, InvalidInput> {
    params.validate()?;

    if bars.is_empty() {
        return Err(InvalidInput::EmptySeries);
    }

    if let Some(index) = bars.iter().position(|bar| !bar.close.is_finite()) {
        return Err(InvalidInput::NonFiniteClose { index });
    }

    if let Some(index) = bars.windows(2).position(|pair| pair[1].ts <= pair[0].ts) {
        return Err(InvalidInput::NonIncreasingTimestamp { index: index + 1 });
    }

    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let fast = ema(&closes, params.fast_period);
    let slow = ema(&closes, params.slow_period);
    let momentum = rsi(&closes, params.momentum_period);

    Ok(bars
        .iter()
        .cloned()
        .zip(fast)
        .zip(slow)
        .zip(momentum)
        .map(|(((bar, fast_avg), slow_avg), momentum)| IndicatorRow {
            bar,
            fast_avg,
            slow_avg,
            momentum,
        })
        .collect())
}

/// Exponential moving average; `None` before index `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut current: Option<f64> = None;

    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let next = match current {
                None => value,
                Some(previous) => alpha * value + (1.0 - alpha) * previous,
            };
            current = Some(next);
            (index + 1 >= period).then_some(next)
        })
        .collect()
}

/// Relative strength index bounded to `[0, 100]`; `None` for the first `period` rows.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut output = vec![None; values.len()];
    if period == 0 || values.len() < 2 {
        return output;
    }

    let alpha = 1.0 / period as f64;
    let mut averages: Option<(f64, f64)> = None;

    for index in 1..values.len() {
        let change = values[index] - values[index - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        let (avg_gain, avg_loss) = match averages {
            None => (gain, loss),
            Some((avg_gain, avg_loss)) => (
                alpha * gain + (1.0 - alpha) * avg_gain,
                alpha * loss + (1.0 - alpha) * avg_loss,
            ),
        };
        averages = Some((avg_gain, avg_loss));

        if index >= period {
            output[index] = Some(if avg_loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
            });
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(index, &close)| {
                let ts = UtcDateTime::from_unix_millis(1_704_067_200_000 + index as i64 * 3_600_000)
                    .expect("valid timestamp");
                PriceBar::new(ts, close, close, close, close, 1.0).expect("valid bar")
            })
            .collect()
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("value should be defined");
        assert!((value - expected).abs() < 1e-9, "{value} != {expected}");
    }

    #[test]
    fn ema_seeds_with_first_value_and_hides_warm_up() {
        let values = ema(&[1.0, 2.0, 3.0], 2);

        assert_eq!(values[0], None);
        assert_close(values[1], 5.0 / 3.0);
        assert_close(values[2], 23.0 / 9.0);
    }

    #[test]
    fn ema_with_unit_period_tracks_input() {
        let values = ema(&[4.0, 7.0, 1.0], 1);
        assert_eq!(values, vec![Some(4.0), Some(7.0), Some(1.0)]);
    }

    #[test]
    fn rsi_uses_wilder_smoothing() {
        let values = rsi(&[10.0, 11.0, 10.0, 12.0], 2);

        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert_close(values[2], 50.0);
        assert_close(values[3], 100.0 - 100.0 / 6.0);
    }

    #[test]
    fn rsi_saturates_on_one_sided_moves() {
        let rising = rsi(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_close(rising[3], 100.0);

        let falling = rsi(&[4.0, 3.0, 2.0, 1.0], 2);
        assert_close(falling[3], 0.0);
    }

    #[test]
    fn compute_preserves_length_and_order() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        let input = bars(&closes);
        let params = IndicatorParams::new(5, 12, 7).expect("valid params");

        let rows = compute(&input, &params).expect("compute should succeed");

        assert_eq!(rows.len(), input.len());
        for (row, bar) in rows.iter().zip(&input) {
            assert_eq!(&row.bar, bar);
        }

        let first_complete = params.first_complete_row();
        assert_eq!(first_complete, 11);
        assert!(rows[..first_complete].iter().all(|row| !row.is_complete()));
        assert!(rows[first_complete..].iter().all(IndicatorRow::is_complete));
        assert!(rows
            .iter()
            .filter_map(|row| row.momentum)
            .all(|value| (0.0..=100.0).contains(&value)));
    }

    #[test]
    fn compute_rejects_empty_series() {
        let params = IndicatorParams::new(2, 3, 2).expect("valid params");
        assert_eq!(compute(&[], &params), Err(InvalidInput::EmptySeries));
    }

    #[test]
    fn compute_rejects_zero_period() {
        let params = IndicatorParams {
            fast_period: 3,
            slow_period: 0,
            momentum_period: 2,
        };
        assert_eq!(
            compute(&bars(&[1.0, 2.0]), &params),
            Err(InvalidInput::NonPositivePeriod {
                name: "slow_period"
            })
        );
    }

    #[test]
    fn compute_rejects_unordered_bars() {
        let mut input = bars(&[1.0, 2.0, 3.0]);
        input.swap(1, 2);
        let params = IndicatorParams::new(1, 2, 1).expect("valid params");

        assert_eq!(
            compute(&input, &params),
            Err(InvalidInput::NonIncreasingTimestamp { index: 2 })
        );
    }

    #[test]
    fn compute_rejects_non_finite_close() {
        let mut input = bars(&[1.0, 2.0, 3.0]);
        input[1].close = f64::INFINITY;
        let params = IndicatorParams::new(1, 2, 1).expect("valid params");

        assert_eq!(
            compute(&input, &params),
            Err(InvalidInput::NonFiniteClose { index: 1 })
        );
    }
}
