//! Core engine for crosswatch.
//!
//! This crate contains:
//! - Validated domain models (symbol, timeframe, bars, series)
//! - EMA/RSI indicator computation and crossover classification
//! - The alert ledger used to avoid duplicate notifications
//! - Collaborator traits with concrete implementations: Binance market data,
//!   SVG charts, SMTP email and Twilio-style messaging
//! - Configuration loading and the single-pass alert pipeline

pub mod adapters;
pub mod chart;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod indicators;
pub mod ledger;
pub mod market_data;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod signal;

pub use adapters::{BinanceSource, BINANCE_BASE_URL};
pub use chart::{ChartError, ChartRenderer, SvgChartRenderer};
pub use config::{AppConfig, ConfigError};
pub use domain::{PriceBar, PriceSeries, Symbol, Timeframe, UtcDateTime};
pub use error::{InvalidInput, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};
pub use indicators::{IndicatorParams, IndicatorRow};
pub use ledger::{AlertLedger, JsonFileStore, LedgerError, LedgerLock, LedgerStore, MemoryStore};
pub use market_data::{FetchRequest, MarketDataSource, SourceError, SourceErrorKind};
pub use notify::{
    Channel, DeliveryError, Dispatcher, EmailDispatcher, EmailSettings, MessagingDispatcher,
    MessagingSettings, Notification,
};
pub use pipeline::{AlertError, AlertPipeline, PipelineSettings, RunOutcome};
pub use retry::{Backoff, RetryConfig};
pub use signal::{ConfirmationThresholds, CrossoverEvent, CrossoverKind, Signal};
