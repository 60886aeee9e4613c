//! One alert pass: fetch, compute, classify, de-duplicate, notify, record.
//!
//! Notifications are dispatched *before* the ledger is written. A crash or a
//! ledger write failure between the two re-sends the alert on the next run
//! (at-least-once delivery); a failed dispatch is never recorded, so it is
//! retried by the next invocation as well.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::chart::{ChartError, ChartRenderer};
use crate::config::{AppConfig, ConfigError};
use crate::indicators::{compute, IndicatorParams, IndicatorRow};
use crate::ledger::{LedgerError, LedgerStore};
use crate::market_data::{FetchRequest, MarketDataSource, SourceError};
use crate::notify::{DeliveryError, Dispatcher, Notification};
use crate::signal::{evaluate, ConfirmationThresholds, CrossoverEvent, CrossoverKind, Signal};
use crate::InvalidInput;

/// Run-level error covering every collaborator.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("market data fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    NoSignal,
    Unconfirmed { kind: CrossoverKind, momentum: f64 },
    AlreadyNotified(CrossoverEvent),
    Dispatched(CrossoverEvent),
    DryRun(CrossoverEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub request: FetchRequest,
    pub indicators: IndicatorParams,
    pub thresholds: ConfirmationThresholds,
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, AlertError> {
        let request = FetchRequest::new(config.symbol.clone(), config.timeframe, config.limit)?;
        Ok(Self {
            request,
            indicators: config.indicators,
            thresholds: config.thresholds,
            dry_run: false,
        })
    }
}

pub struct AlertPipeline {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn LedgerStore>,
    renderer: Arc<dyn ChartRenderer>,
    dispatchers: Vec<Arc<dyn Dispatcher>>,
    settings: PipelineSettings,
}

impl AlertPipeline {
    /// `dispatchers` are sent to in the given order.
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn LedgerStore>,
        renderer: Arc<dyn ChartRenderer>,
        dispatchers: Vec<Arc<dyn Dispatcher>>,
    ) -> Self {
        Self {
            source,
            store,
            renderer,
            dispatchers,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run_once(&self) -> Result<RunOutcome, AlertError> {
        let result = self.run_inner().await;
        if let Err(error) = &result {
            error!(%error, "alert run failed");
        }
        result
    }

    async fn run_inner(&self) -> Result<RunOutcome, AlertError> {
        let request = &self.settings.request;
        let mut ledger = self.store.load()?;
        debug!(entries = ledger.len(), "ledger loaded");

        info!(
            source = self.source.name(),
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            limit = request.limit,
            "fetching market data"
        );
        let series = self.source.fetch(request).await?;
        info!(bars = series.len(), "market data fetched");

        let rows = compute(series.bars(), &self.settings.indicators)?;
        let (previous, latest) = last_two(&rows)?;
        log_latest(latest);

        let thresholds = &self.settings.thresholds;
        let event = match evaluate(previous, latest, thresholds)? {
            Signal::None => {
                info!(date = %latest.ts(), "no crossover on latest bar");
                return Ok(RunOutcome::NoSignal);
            }
            Signal::Unconfirmed { kind, momentum } => {
                info!(%kind, momentum, "crossover detected but not confirmed by RSI");
                return Ok(RunOutcome::Unconfirmed { kind, momentum });
            }
            Signal::Confirmed { kind, momentum } => {
                CrossoverEvent::confirmed(latest, kind, momentum, &request.symbol)
            }
        };
        info!(kind = %event.kind(), date = %event.date(), "crossover confirmed");

        if ledger.was_sent(event.date(), event.kind()) {
            info!(kind = %event.kind(), date = %event.date(), "alert already sent for this bar");
            return Ok(RunOutcome::AlreadyNotified(event));
        }

        if self.settings.dry_run {
            info!("dry run: skipping chart, dispatch and ledger update");
            return Ok(RunOutcome::DryRun(event));
        }

        let chart = ChartGuard::new(
            self.renderer.as_ref(),
            self.renderer.render(
                &rows,
                &request.symbol,
                self.settings.indicators.fast_period,
                self.settings.indicators.slow_period,
            )?,
        );
        info!(path = %chart.path().display(), "chart rendered");

        let notification = Notification::for_event(&event).with_attachment(chart.path());
        for dispatcher in &self.dispatchers {
            dispatcher.send(&notification).await?;
            info!(channel = %dispatcher.channel(), "alert dispatched");
        }

        ledger.record(self.store.as_ref(), event.date(), event.kind())?;
        chart.finish()?;

        info!(kind = %event.kind(), date = %event.date(), "alerts sent and recorded");
        Ok(RunOutcome::Dispatched(event))
    }
}

fn last_two(rows: &[IndicatorRow]) -> Result<(&IndicatorRow, &IndicatorRow), InvalidInput> {
    match rows {
        [.., previous, latest] => Ok((previous, latest)),
        _ => Err(InvalidInput::InsufficientHistory {
            required: 2,
            actual: rows.len(),
        }),
    }
}

fn log_latest(latest: &IndicatorRow) {
    let fmt = |value: Option<f64>| value.map_or_else(|| String::from("n/a"), |v| format!("{v:.2}"));
    info!(
        date = %latest.ts(),
        close = latest.close(),
        fast = %fmt(latest.fast_avg),
        slow = %fmt(latest.slow_avg),
        rsi = %fmt(latest.momentum),
        "latest bar"
    );
}

/// Deletes the rendered chart on every exit path.
struct ChartGuard<'a> {
    renderer: &'a dyn ChartRenderer,
    path: Option<PathBuf>,
}

impl<'a> ChartGuard<'a> {
    fn new(renderer: &'a dyn ChartRenderer, path: PathBuf) -> Self {
        Self {
            renderer,
            path: Some(path),
        }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Deletes the chart and reports failure to the caller.
    fn finish(mut self) -> Result<(), ChartError> {
        match self.path.take() {
            Some(path) => self.renderer.delete(&path),
            None => Ok(()),
        }
    }
}

impl Drop for ChartGuard<'_> {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(error) = self.renderer.delete(&path) {
                warn!(%error, path = %path.display(), "failed to delete chart after aborted run");
            }
        }
    }
}
