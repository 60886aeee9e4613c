//! Market-data collaborator contract.
//!
//! The pipeline only needs one capability from an exchange: the most recent
//! `limit` klines for a pair. Adapters implement [`MarketDataSource`] and
//! classify failures into [`SourceErrorKind`] so the caller can tell a
//! network blip from a rejected API key.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{PriceSeries, Symbol, Timeframe};

/// Largest window a single kline request may ask for.
pub const MAX_FETCH_LIMIT: usize = 1_000;

/// Request for the most recent klines of one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub limit: usize,
}

impl FetchRequest {
    pub fn new(symbol: Symbol, timeframe: Timeframe, limit: usize) -> Result<Self, SourceError> {
        if limit == 0 || limit > MAX_FETCH_LIMIT {
            return Err(SourceError::invalid_request(format!(
                "kline limit must be within 1..={MAX_FETCH_LIMIT}, got {limit}"
            )));
        }

        Ok(Self {
            symbol,
            timeframe,
            limit,
        })
    }
}

/// Failure classification for market-data calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Network,
    Exchange,
    Auth,
    InvalidRequest,
    InvalidResponse,
}

impl SourceErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Exchange => "exchange",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// Structured market-data error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, message)
    }

    pub fn exchange(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Exchange, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidResponse, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for SourceError {}

/// Exchange adapter contract.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable adapter name for logs.
    fn name(&self) -> &'static str;

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>>;
}
