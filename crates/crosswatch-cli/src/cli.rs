//! Command-line definitions.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | One alert pass for the configured symbol |
//! | `ledger list` | Print the alerts already recorded |
//! | `check-config` | Validate the config file and print a redacted summary |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// EMA crossover alerts with RSI confirmation.
///
/// Each invocation fetches recent klines, checks the latest bar for a golden
/// or death cross and, when it is new and confirmed, sends an email with a
/// chart plus a messaging alert. Schedule it with cron or a systemd timer.
#[derive(Debug, Parser)]
#[command(name = "crosswatch", author, version, about = "EMA crossover alerts with RSI confirmation")]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Log filter directive (e.g. `debug`, `crosswatch_core=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one detection pass and notify on a new confirmed cross.
    Run(RunArgs),

    /// Inspect the alert ledger.
    Ledger(LedgerArgs),

    /// Validate the configuration without contacting any service.
    CheckConfig,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Classify and consult the ledger, but do not chart, send or record.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// List recorded alerts, oldest first.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_config_json() {
        let cli = Cli::try_parse_from(["crosswatch", "run"]).expect("parse");

        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert!(!cli.pretty);
        assert!(matches!(cli.command, Command::Run(RunArgs { dry_run: false })));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "crosswatch",
            "ledger",
            "list",
            "--config",
            "/etc/crosswatch.json",
            "--log-level",
            "debug",
        ])
        .expect("parse");

        assert_eq!(cli.config, PathBuf::from("/etc/crosswatch.json"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Command::Ledger(LedgerArgs {
                command: LedgerCommand::List
            })
        ));
    }

    #[test]
    fn dry_run_flag() {
        let cli = Cli::try_parse_from(["crosswatch", "run", "--dry-run"]).expect("parse");
        assert!(matches!(cli.command, Command::Run(RunArgs { dry_run: true })));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["crosswatch"]).is_err());
    }
}
