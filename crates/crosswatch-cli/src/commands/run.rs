use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crosswatch_core::{
    AlertError, AlertPipeline, AppConfig, BinanceSource, Dispatcher, EmailDispatcher,
    JsonFileStore, LedgerLock, MessagingDispatcher, PipelineSettings, RunOutcome,
    SvgChartRenderer,
};

use crate::cli::RunArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    symbol: &'a str,
    timeframe: &'a str,
    dry_run: bool,
    #[serde(flatten)]
    outcome: RunOutcome,
}

pub async fn run(args: &RunArgs, config: &AppConfig) -> Result<Value, CliError> {
    // Dry runs never write, so they do not contend for the ledger.
    let _lock = if args.dry_run {
        None
    } else {
        Some(LedgerLock::acquire(&config.ledger_path)?)
    };

    let mut settings = PipelineSettings::from_config(config)?;
    settings.dry_run = args.dry_run;

    let email = EmailDispatcher::new(&config.email).map_err(AlertError::from)?;
    let messaging = MessagingDispatcher::new(config.messaging.clone());
    let dispatchers: Vec<Arc<dyn Dispatcher>> = vec![Arc::new(email), Arc::new(messaging)];

    debug!(
        ledger = %config.ledger_path.display(),
        charts = %config.chart_dir.display(),
        "collaborators ready"
    );

    let pipeline = AlertPipeline::new(
        settings,
        Arc::new(BinanceSource::default().with_api_key(config.api_key.clone())),
        Arc::new(JsonFileStore::new(&config.ledger_path)),
        Arc::new(SvgChartRenderer::new(&config.chart_dir)),
        dispatchers,
    );
    let outcome = pipeline.run_once().await?;

    Ok(serde_json::to_value(RunSummary {
        symbol: config.symbol.as_str(),
        timeframe: config.timeframe.as_str(),
        dry_run: args.dry_run,
        outcome,
    })?)
}
