use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Kline intervals accepted by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    pub const ALL: [Self; 15] = [
        Self::OneMinute,
        Self::ThreeMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::SixHours,
        Self::EightHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::ThreeDays,
        Self::OneWeek,
        Self::OneMonth,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // `1M` (month) and `1m` (minute) differ only by case.
        if trimmed == "1M" {
            return Ok(Self::OneMonth);
        }

        let lowered = trimmed.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|timeframe| timeframe.as_str() == lowered)
            .ok_or_else(|| ValidationError::InvalidTimeframe {
                value: trimmed.to_owned(),
            })
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timeframe() {
        assert_eq!(Timeframe::from_str("4h").expect("must parse"), Timeframe::FourHours);
        assert_eq!(Timeframe::from_str("1D").expect("must parse"), Timeframe::OneDay);
    }

    #[test]
    fn distinguishes_month_from_minute() {
        assert_eq!(Timeframe::from_str("1M").expect("must parse"), Timeframe::OneMonth);
        assert_eq!(Timeframe::from_str("1m").expect("must parse"), Timeframe::OneMinute);
    }

    #[test]
    fn rejects_invalid_timeframe() {
        let err = Timeframe::from_str("2d").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimeframe { .. }));
    }
}
