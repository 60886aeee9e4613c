//! Crossover classification of the latest bar against the previous one.
//!
//! A golden cross is `prev.fast <= prev.slow && latest.fast > latest.slow`;
//! a death cross is the mirror image. The strict/non-strict pairing makes the
//! two conditions mutually exclusive. A detected cross only becomes an event
//! when the latest momentum confirms it: strictly below the buy ceiling for a
//! golden cross, strictly above the sell floor for a death cross. The check
//! is point-in-time; an unconfirmed cross is never revisited.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorRow;
use crate::{InvalidInput, Symbol, UtcDateTime};

/// Direction of a fast/slow average cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossoverKind {
    GoldenCross,
    DeathCross,
}

impl CrossoverKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoldenCross => "GoldenCross",
            Self::DeathCross => "DeathCross",
        }
    }

    /// Trading side the cross suggests, used in notification text.
    pub const fn side(self) -> &'static str {
        match self {
            Self::GoldenCross => "Buy",
            Self::DeathCross => "Sell",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::GoldenCross => "Golden Cross",
            Self::DeathCross => "Death Cross",
        }
    }
}

impl Display for CrossoverKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Momentum bounds a cross must respect to be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationThresholds {
    pub buy_ceiling: f64,
    pub sell_floor: f64,
}

impl Default for ConfirmationThresholds {
    fn default() -> Self {
        Self {
            buy_ceiling: 50.0,
            sell_floor: 50.0,
        }
    }
}

impl ConfirmationThresholds {
    pub fn confirms(&self, kind: CrossoverKind, momentum: f64) -> bool {
        match kind {
            CrossoverKind::GoldenCross => momentum < self.buy_ceiling,
            CrossoverKind::DeathCross => momentum > self.sell_floor,
        }
    }
}

/// A confirmed cross on the latest bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossoverEvent {
    date: UtcDateTime,
    kind: CrossoverKind,
    momentum_at_signal: f64,
    symbol: Symbol,
}

impl CrossoverEvent {
    /// Event for a cross on `latest` that momentum has already confirmed.
    pub(crate) fn confirmed(
        latest: &IndicatorRow,
        kind: CrossoverKind,
        momentum: f64,
        symbol: &Symbol,
    ) -> Self {
        Self {
            date: latest.ts(),
            kind,
            momentum_at_signal: momentum,
            symbol: symbol.clone(),
        }
    }

    pub fn date(&self) -> UtcDateTime {
        self.date
    }

    pub fn kind(&self) -> CrossoverKind {
        self.kind
    }

    pub fn momentum_at_signal(&self) -> f64 {
        self.momentum_at_signal
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

/// Full evaluation result, including crosses the momentum filter rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    None,
    Unconfirmed { kind: CrossoverKind, momentum: f64 },
    Confirmed { kind: CrossoverKind, momentum: f64 },
}

/// Raw cross detection without the momentum filter.
pub fn detect_cross(
    previous: &IndicatorRow,
    latest: &IndicatorRow,
) -> Result<Option<CrossoverKind>, InvalidInput> {
    if previous.ts() >= latest.ts() {
        return Err(InvalidInput::RowsOutOfOrder {
            previous: previous.ts().to_string(),
            latest: latest.ts().to_string(),
        });
    }

    let (prev_fast, prev_slow) = averages(previous)?;
    let (fast, slow) = averages(latest)?;

    if prev_fast <= prev_slow && fast > slow {
        Ok(Some(CrossoverKind::GoldenCross))
    } else if prev_fast >= prev_slow && fast < slow {
        Ok(Some(CrossoverKind::DeathCross))
    } else {
        Ok(None)
    }
}

/// Detects a cross and applies the momentum confirmation.
pub fn evaluate(
    previous: &IndicatorRow,
    latest: &IndicatorRow,
    thresholds: &ConfirmationThresholds,
) -> Result<Signal, InvalidInput> {
    let Some(kind) = detect_cross(previous, latest)? else {
        return Ok(Signal::None);
    };

    let momentum = latest.momentum.ok_or_else(|| InvalidInput::UndefinedIndicator {
        field: "momentum",
        at: latest.ts().to_string(),
    })?;

    if thresholds.confirms(kind, momentum) {
        Ok(Signal::Confirmed { kind, momentum })
    } else {
        Ok(Signal::Unconfirmed { kind, momentum })
    }
}

/// Returns the confirmed event for `latest`, if any.
pub fn classify(
    previous: &IndicatorRow,
    latest: &IndicatorRow,
    thresholds: &ConfirmationThresholds,
    symbol: &Symbol,
) -> Result<Option<CrossoverEvent>, InvalidInput> {
    match evaluate(previous, latest, thresholds)? {
        Signal::Confirmed { kind, momentum } => {
            Ok(Some(CrossoverEvent::confirmed(latest, kind, momentum, symbol)))
        }
        Signal::None | Signal::Unconfirmed { .. } => Ok(None),
    }
}

fn averages(row: &IndicatorRow) -> Result<(f64, f64), InvalidInput> {
    let undefined = |field| InvalidInput::UndefinedIndicator {
        field,
        at: row.ts().to_string(),
    };
    let fast = row.fast_avg.ok_or_else(|| undefined("fast_avg"))?;
    let slow = row.slow_avg.ok_or_else(|| undefined("slow_avg"))?;
    Ok((fast, slow))
}
