use std::path::Path;

use serde_json::{json, Value};

use crosswatch_core::AppConfig;

use crate::error::CliError;

/// Redacted view of the resolved configuration.
pub fn run(config_path: &Path, config: &AppConfig) -> Result<Value, CliError> {
    let display = |path: &Path| path.display().to_string();

    Ok(json!({
        "config_path": display(config_path),
        "valid": true,
        "symbol": config.symbol.as_str(),
        "timeframe": config.timeframe.as_str(),
        "limit": config.limit,
        "indicators": {
            "fast_ema_period": config.indicators.fast_period,
            "slow_ema_period": config.indicators.slow_period,
            "rsi_period": config.indicators.momentum_period,
        },
        "thresholds": {
            "rsi_buy_ceiling": config.thresholds.buy_ceiling,
            "rsi_sell_floor": config.thresholds.sell_floor,
        },
        "email": {
            "sender": config.email.sender,
            "receiver": config.email.receiver,
            "smtp_host": config.email.smtp_host,
            "smtp_port": config.email.smtp_port,
        },
        "messaging": {
            "from_number": config.messaging.from_number,
            "to_number": config.messaging.to_number,
            "base_url": config.messaging.base_url,
        },
        "api_key_configured": config.api_key.is_some(),
        "secret_key_configured": config.secret_key.is_some(),
        "ledger_path": display(&config.ledger_path),
        "chart_dir": display(&config.chart_dir),
        "log_file": config.log_file.as_deref().map(display),
    }))
}
