mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use crosswatch_core::AppConfig;
use tracing::{error, info};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    // The log file location lives in the config, so logging starts after it is read.
    let config = AppConfig::load(&cli.config);
    logging::init(
        cli.log_level.as_deref(),
        config.as_ref().ok().and_then(|config| config.log_file.as_deref()),
    )?;
    let config = config.inspect_err(|error| error!(%error, "configuration rejected"))?;

    info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "crosswatch starting"
    );

    let value = commands::run(&cli, &config).await?;
    output::render(&value, cli.pretty)?;
    Ok(())
}
