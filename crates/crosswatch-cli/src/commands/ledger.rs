use serde::Serialize;
use serde_json::Value;

use crosswatch_core::{AppConfig, CrossoverKind, JsonFileStore, LedgerStore, UtcDateTime};

use crate::cli::{LedgerArgs, LedgerCommand};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct LedgerEntry {
    date: UtcDateTime,
    kind: CrossoverKind,
}

#[derive(Debug, Serialize)]
struct LedgerListing {
    path: String,
    count: usize,
    entries: Vec<LedgerEntry>,
}

pub fn run(args: &LedgerArgs, config: &AppConfig) -> Result<Value, CliError> {
    match args.command {
        LedgerCommand::List => list(config),
    }
}

fn list(config: &AppConfig) -> Result<Value, CliError> {
    let store = JsonFileStore::new(&config.ledger_path);
    let ledger = store.load()?;

    let entries: Vec<LedgerEntry> = ledger
        .entries()
        .map(|(date, kind)| LedgerEntry { date, kind })
        .collect();

    Ok(serde_json::to_value(LedgerListing {
        path: store.path().display().to_string(),
        count: entries.len(),
        entries,
    })?)
}
