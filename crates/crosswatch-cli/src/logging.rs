use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::CliError;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber: stderr always, plus `log_file` (no ANSI) when set.
///
/// An explicit `--log-level` wins over `RUST_LOG`.
pub fn init(directive: Option<&str>, log_file: Option<&Path>) -> Result<(), CliError> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive).map_err(|error| CliError::LogFilter {
            directive: directive.to_owned(),
            message: error.to_string(),
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|error| CliError::Logging(error.to_string()))
}
