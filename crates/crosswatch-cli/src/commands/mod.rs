mod check_config;
mod ledger;
mod run;

use crosswatch_core::AppConfig;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli, config: &AppConfig) -> Result<Value, CliError> {
    match &cli.command {
        Command::Run(args) => run::run(args, config).await,
        Command::Ledger(args) => ledger::run(args, config),
        Command::CheckConfig => check_config::run(&cli.config, config),
    }
}
