use thiserror::Error;

/// Validation errors raised while constructing domain types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error(
        "invalid timeframe '{value}', expected one of 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M"
    )]
    InvalidTimeframe { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unix timestamp {millis}ms is out of range")]
    TimestampOutOfRange { millis: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
    #[error("bar timestamps must be strictly increasing (index {index})")]
    NonIncreasingTimestamp { index: usize },
}

/// Malformed price or indicator data handed to the signal engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("price series is empty")]
    EmptySeries,
    #[error("close price at index {index} is not a finite number")]
    NonFiniteClose { index: usize },
    #[error("timestamps must be strictly increasing (index {index})")]
    NonIncreasingTimestamp { index: usize },
    #[error("period '{name}' must be greater than zero")]
    NonPositivePeriod { name: &'static str },
    #[error("need at least {required} indicator rows to classify, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },
    #[error("indicator '{field}' is undefined at {at}")]
    UndefinedIndicator { field: &'static str, at: String },
    #[error("rows are not consecutive: previous {previous} is not before latest {latest}")]
    RowsOutOfOrder { previous: String, latest: String },
}
