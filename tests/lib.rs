//! Shared fakes for behaviour tests.
//!
//! Every collaborator of the alert pipeline has an in-process stand-in that
//! records what it was asked to do, so tests can assert on dispatches,
//! rendered charts and deleted files without touching the network.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub use crosswatch_core::chart::ChartError;
pub use crosswatch_core::notify::DeliveryFuture;
pub use crosswatch_core::{
    AlertError, AlertLedger, AlertPipeline, Channel, ChartRenderer, ConfirmationThresholds,
    CrossoverKind, DeliveryError, Dispatcher, FetchRequest, IndicatorParams, IndicatorRow,
    JsonFileStore, LedgerError, LedgerStore, MarketDataSource, MemoryStore, Notification,
    PipelineSettings, PriceBar, PriceSeries, RunOutcome, SourceError, Symbol, Timeframe,
    UtcDateTime,
};

/// 2024-01-01T00:00:00Z
pub const START_MILLIS: i64 = 1_704_067_200_000;
pub const HOUR_MILLIS: i64 = 3_600_000;

/// Falling market that turns up on the last bar: golden cross, RSI ~33.
pub const GOLDEN_CONFIRMED: [f64; 6] = [20.0, 18.0, 16.0, 14.0, 12.0, 13.0];
/// Same cross with a violent last bar: RSI 80, rejected.
pub const GOLDEN_UNCONFIRMED: [f64; 6] = [20.0, 18.0, 16.0, 14.0, 12.0, 20.0];
/// Rising market that dips on the last bar: death cross, RSI ~57.
pub const DEATH_CONFIRMED: [f64; 6] = [10.0, 12.0, 14.0, 16.0, 18.0, 16.5];
/// Same cross with a crash on the last bar: RSI 20, rejected.
pub const DEATH_UNCONFIRMED: [f64; 6] = [10.0, 12.0, 14.0, 16.0, 18.0, 10.0];
pub const STEADY_RISE: [f64; 6] = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0];

pub fn symbol() -> Symbol {
    Symbol::parse("BTC/USDT").expect("valid symbol")
}

pub fn bar_time(index: usize) -> UtcDateTime {
    UtcDateTime::from_unix_millis(START_MILLIS + index as i64 * HOUR_MILLIS).expect("valid timestamp")
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(index, &close)| {
            PriceBar::new(bar_time(index), close, close, close, close, 10.0).expect("valid bar")
        })
        .collect();
    PriceSeries::new(symbol(), Timeframe::OneHour, bars).expect("valid series")
}

/// fast EMA 1 (the close itself), slow EMA 2, RSI 2.
pub fn settings(dry_run: bool) -> PipelineSettings {
    PipelineSettings {
        request: FetchRequest::new(symbol(), Timeframe::OneHour, 50).expect("valid request"),
        indicators: IndicatorParams::new(1, 2, 2).expect("valid params"),
        thresholds: ConfirmationThresholds::default(),
        dry_run,
    }
}

pub struct ScriptedSource {
    result: Result<PriceSeries, SourceError>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_closes(closes: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(series_from_closes(closes)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: SourceError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn fetch<'a>(
        &'a self,
        _request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub notification: Notification,
    /// Whether the attachment was on disk at send time.
    pub attachment_present: bool,
}

pub struct RecordingDispatcher {
    channel: Channel,
    failure: Option<String>,
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingDispatcher {
    pub fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failure: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(channel: Channel, message: &str) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failure: Some(message.to_owned()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("lock").clone()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(async move {
            if let Some(message) = &self.failure {
                return Err(DeliveryError::new(self.channel, message.clone()));
            }
            self.sent.lock().expect("lock").push(SentNotification {
                notification: notification.clone(),
                attachment_present: notification.attachment().is_some_and(Path::exists),
            });
            Ok(())
        })
    }
}

/// Writes a placeholder file per render so deletion is observable.
pub struct RecordingRenderer {
    dir: PathBuf,
    rendered: Mutex<Vec<PathBuf>>,
    deleted: Mutex<Vec<PathBuf>>,
}

impl RecordingRenderer {
    pub fn new(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            rendered: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn rendered(&self) -> Vec<PathBuf> {
        self.rendered.lock().expect("lock").clone()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().expect("lock").clone()
    }
}

impl ChartRenderer for RecordingRenderer {
    fn render(
        &self,
        rows: &[IndicatorRow],
        symbol: &Symbol,
        _fast_period: usize,
        _slow_period: usize,
    ) -> Result<PathBuf, ChartError> {
        let mut rendered = self.rendered.lock().expect("lock");
        let path = self
            .dir
            .join(format!("{}_{}.svg", symbol.file_stem(), rendered.len()));
        std::fs::write(&path, format!("<svg rows=\"{}\"/>", rows.len())).map_err(|source| {
            ChartError::Io {
                path: path.clone(),
                source,
            }
        })?;
        rendered.push(path.clone());
        Ok(path)
    }

    fn delete(&self, path: &Path) -> Result<(), ChartError> {
        self.deleted.lock().expect("lock").push(path.to_path_buf());
        match std::fs::remove_file(path) {
            Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(ChartError::Io {
                path: path.to_path_buf(),
                source: error,
            }),
            _ => Ok(()),
        }
    }
}

/// Wires a pipeline with email then messaging, in that order.
pub fn pipeline(
    settings: PipelineSettings,
    source: Arc<ScriptedSource>,
    store: Arc<dyn LedgerStore>,
    renderer: Arc<RecordingRenderer>,
    dispatchers: &[Arc<RecordingDispatcher>],
) -> AlertPipeline {
    AlertPipeline::new(
        settings,
        source,
        store,
        renderer,
        dispatchers
            .iter()
            .map(|dispatcher| dispatcher.clone() as Arc<dyn Dispatcher>)
            .collect(),
    )
}
