//! JSON configuration document.
//!
//! The file is parsed into a loose mirror where every key is optional, then
//! validated into [`AppConfig`] so a missing key is reported by its dotted
//! name (`email.sender`) instead of a serde position. Relative paths are
//! resolved against the directory holding the config file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::indicators::IndicatorParams;
use crate::market_data::MAX_FETCH_LIMIT;
use crate::notify::{
    EmailSettings, MessagingSettings, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT, TWILIO_BASE_URL,
};
use crate::signal::ConfirmationThresholds;
use crate::{Symbol, Timeframe};

pub const DEFAULT_LEDGER_FILE: &str = "alerts_log.json";
pub const DEFAULT_CHART_DIR: &str = "assets";

pub const ENV_API_KEY: &str = "CROSSWATCH_API_KEY";
pub const ENV_SECRET_KEY: &str = "CROSSWATCH_SECRET_KEY";
pub const ENV_SMTP_PASSWORD: &str = "CROSSWATCH_SMTP_PASSWORD";
pub const ENV_TWILIO_AUTH_TOKEN: &str = "CROSSWATCH_TWILIO_AUTH_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required config key '{key}'")]
    MissingKey { key: String },

    #[error("invalid value for config key '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    symbol: Option<String>,
    timeframe: Option<String>,
    limit: Option<usize>,
    fast_ema_period: Option<usize>,
    slow_ema_period: Option<usize>,
    rsi_period: Option<usize>,
    email: Option<RawEmail>,
    whatsapp: Option<RawMessaging>,
    api_key: Option<String>,
    secret_key: Option<String>,
    rsi_buy_ceiling: Option<f64>,
    rsi_sell_floor: Option<f64>,
    ledger_path: Option<PathBuf>,
    chart_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEmail {
    sender: Option<String>,
    password: Option<String>,
    receiver: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessaging {
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    to_number: Option<String>,
    base_url: Option<String>,
}

/// Validated configuration with every path already resolved.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub limit: usize,
    pub indicators: IndicatorParams,
    pub thresholds: ConfirmationThresholds,
    pub email: EmailSettings,
    pub messaging: MessagingSettings,
    pub api_key: Option<String>,
    /// Accepted for account endpoints; public klines never need it.
    pub secret_key: Option<String>,
    pub ledger_path: PathBuf,
    pub chart_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("symbol", &self.symbol)
            .field("timeframe", &self.timeframe)
            .field("limit", &self.limit)
            .field("indicators", &self.indicators)
            .field("thresholds", &self.thresholds)
            .field("email", &self.email)
            .field("messaging", &self.messaging)
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("ledger_path", &self.ledger_path)
            .field("chart_dir", &self.chart_dir)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl AppConfig {
    /// Loads `path`, applying `CROSSWATCH_*` secret overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: RawConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::from_raw(parsed, base_dir, &env)
    }

    /// Parses a JSON document directly. Relative paths resolve against `base_dir`.
    pub fn from_json_str(
        raw: &str,
        base_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let parsed: RawConfig = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_raw(parsed, base_dir, &env)
    }

    fn from_raw(
        raw: RawConfig,
        base_dir: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let override_with = |name: &str, value: Option<String>| {
            non_blank(env(name)).or(value)
        };

        let symbol = Symbol::parse(&require("symbol", raw.symbol)?)
            .map_err(|e| ConfigError::invalid("symbol", e.to_string()))?;
        let timeframe = require("timeframe", raw.timeframe)?
            .parse::<Timeframe>()
            .map_err(|e| ConfigError::invalid("timeframe", e.to_string()))?;

        let limit = require("limit", raw.limit)?;
        if limit == 0 || limit > MAX_FETCH_LIMIT {
            return Err(ConfigError::invalid(
                "limit",
                format!("must be between 1 and {MAX_FETCH_LIMIT}, got {limit}"),
            ));
        }

        let indicators = IndicatorParams::new(
            require("fast_ema_period", raw.fast_ema_period)?,
            require("slow_ema_period", raw.slow_ema_period)?,
            require("rsi_period", raw.rsi_period)?,
        )
        .map_err(|e| ConfigError::invalid("indicator periods", e.to_string()))?;

        // Classification reads the last two rows, both past the warm-up.
        let min_limit = indicators.first_complete_row() + 2;
        if limit < min_limit {
            return Err(ConfigError::invalid(
                "limit",
                format!("must be at least {min_limit} to cover the indicator warm-up, got {limit}"),
            ));
        }

        let defaults = ConfirmationThresholds::default();
        let thresholds = ConfirmationThresholds {
            buy_ceiling: momentum_bound("rsi_buy_ceiling", raw.rsi_buy_ceiling, defaults.buy_ceiling)?,
            sell_floor: momentum_bound("rsi_sell_floor", raw.rsi_sell_floor, defaults.sell_floor)?,
        };

        let email_raw = raw
            .email
            .ok_or_else(|| ConfigError::MissingKey { key: String::from("email") })?;
        let email = EmailSettings {
            sender: require("email.sender", email_raw.sender)?,
            password: require(
                "email.password",
                override_with(ENV_SMTP_PASSWORD, email_raw.password),
            )?,
            receiver: require("email.receiver", email_raw.receiver)?,
            smtp_host: email_raw
                .smtp_host
                .unwrap_or_else(|| String::from(DEFAULT_SMTP_HOST)),
            smtp_port: email_raw.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
        };

        let messaging_raw = raw
            .whatsapp
            .ok_or_else(|| ConfigError::MissingKey { key: String::from("whatsapp") })?;
        let messaging = MessagingSettings {
            account_sid: require("whatsapp.account_sid", messaging_raw.account_sid)?,
            auth_token: require(
                "whatsapp.auth_token",
                override_with(ENV_TWILIO_AUTH_TOKEN, messaging_raw.auth_token),
            )?,
            from_number: require("whatsapp.from_number", messaging_raw.from_number)?,
            to_number: require("whatsapp.to_number", messaging_raw.to_number)?,
            base_url: messaging_raw
                .base_url
                .unwrap_or_else(|| String::from(TWILIO_BASE_URL)),
        };

        Ok(Self {
            symbol,
            timeframe,
            limit,
            indicators,
            thresholds,
            email,
            messaging,
            api_key: non_blank(override_with(ENV_API_KEY, raw.api_key)),
            secret_key: non_blank(override_with(ENV_SECRET_KEY, raw.secret_key)),
            ledger_path: resolve(
                base_dir,
                raw.ledger_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE)),
            ),
            chart_dir: resolve(
                base_dir,
                raw.chart_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CHART_DIR)),
            ),
            log_file: raw.log_file.map(|path| resolve(base_dir, path)),
        })
    }
}

fn require<T>(key: &str, value: Option<T>) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey { key: key.to_owned() })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn momentum_bound(key: &str, value: Option<f64>, default: f64) -> Result<f64, ConfigError> {
    let value = value.unwrap_or(default);
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::invalid(key, format!("must be within [0, 100], got {value}")));
    }
    Ok(value)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"{
        "symbol": "BTC/USDT",
        "timeframe": "1h",
        "limit": 200,
        "fast_ema_period": 12,
        "slow_ema_period": 26,
        "rsi_period": 14,
        "api_key": "file-key",
        "email": {
            "sender": "alerts@example.com",
            "password": "file-password",
            "receiver": "trader@example.com"
        },
        "whatsapp": {
            "account_sid": "AC123",
            "auth_token": "file-token",
            "from_number": "whatsapp:+14155238886",
            "to_number": "whatsapp:+34600000000"
        }
    }"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_full_document_with_defaults() {
        let config = AppConfig::from_json_str(FULL, Path::new("/srv/crosswatch"), no_env)
            .expect("config should parse");

        assert_eq!(config.symbol.as_str(), "BTC/USDT");
        assert_eq!(config.timeframe, Timeframe::OneHour);
        assert_eq!(config.limit, 200);
        assert_eq!(config.indicators.slow_period, 26);
        assert_eq!(config.thresholds, ConfirmationThresholds::default());
        assert_eq!(config.email.smtp_host, DEFAULT_SMTP_HOST);
        assert_eq!(config.email.smtp_port, 465);
        assert_eq!(config.messaging.base_url, TWILIO_BASE_URL);
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.secret_key, None);
        assert_eq!(config.ledger_path, PathBuf::from("/srv/crosswatch/alerts_log.json"));
        assert_eq!(config.chart_dir, PathBuf::from("/srv/crosswatch/assets"));
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn missing_nested_key_is_named_with_dots() {
        let raw = FULL.replace(r#""receiver": "trader@example.com""#, r#""cc": "x@example.com""#);

        let error = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect_err("must fail");
        assert!(matches!(error, ConfigError::MissingKey { ref key } if key == "email.receiver"));
    }

    #[test]
    fn missing_section_is_reported() {
        let error = AppConfig::from_json_str(r#"{"symbol": "BTC/USDT"}"#, Path::new("."), no_env)
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::MissingKey { ref key } if key == "timeframe"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SMTP_PASSWORD, "env-password"),
            (ENV_TWILIO_AUTH_TOKEN, "env-token"),
            (ENV_SECRET_KEY, "env-secret"),
            (ENV_API_KEY, "  "),
        ]);
        let config = AppConfig::from_json_str(FULL, Path::new("."), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .expect("config should parse");

        assert_eq!(config.email.password, "env-password");
        assert_eq!(config.messaging.auth_token, "env-token");
        assert_eq!(config.secret_key.as_deref(), Some("env-secret"));
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let raw = FULL.replace(r#""limit": 200"#, r#""limit": 5000"#);
        let error = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidValue { ref key, .. } if key == "limit"));

        let raw = FULL.replace(r#""rsi_period": 14"#, r#""rsi_period": 14, "rsi_buy_ceiling": 120"#);
        let error = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidValue { ref key, .. } if key == "rsi_buy_ceiling"));

        let raw = FULL.replace(r#""timeframe": "1h""#, r#""timeframe": "7h""#);
        let error = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidValue { ref key, .. } if key == "timeframe"));
    }

    #[test]
    fn limit_must_cover_indicator_warm_up() {
        // slow period 26 first defines every column at row 25
        let raw = FULL.replace(r#""limit": 200"#, r#""limit": 26"#);
        let error = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidValue { ref key, .. } if key == "limit"));

        let raw = FULL.replace(r#""limit": 200"#, r#""limit": 27"#);
        let config = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect("config");
        assert_eq!(config.limit, 27);
    }

    #[test]
    fn accepts_pairs_with_numeric_base_asset() {
        let raw = FULL.replace(r#""symbol": "BTC/USDT""#, r#""symbol": "1INCH/USDT""#);

        let config = AppConfig::from_json_str(&raw, Path::new("."), no_env).expect("config");

        assert_eq!(config.symbol.exchange_code(), "1INCHUSDT");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = AppConfig::from_json_str(FULL, Path::new("."), no_env).expect("config");
        let rendered = format!("{config:?}");

        for secret in ["file-key", "file-password", "file-token"] {
            assert!(!rendered.contains(secret), "{secret} leaked into Debug output");
        }
    }

    #[test]
    fn load_resolves_paths_against_config_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let raw = FULL.replace(
            r#""api_key": "file-key","#,
            r#""ledger_path": "state/ledger.json", "chart_dir": "/var/charts", "log_file": "crosswatch.log","#,
        );
        let path = dir.path().join("config.json");
        fs::write(&path, raw).expect("write config");

        let config = AppConfig::load_with_env(&path, no_env).expect("config");

        assert_eq!(config.ledger_path, dir.path().join("state/ledger.json"));
        assert_eq!(config.chart_dir, PathBuf::from("/var/charts"));
        assert_eq!(config.log_file, Some(dir.path().join("crosswatch.log")));
    }

    #[test]
    fn unreadable_and_malformed_files_are_distinguished() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = AppConfig::load_with_env(&dir.path().join("nope.json"), no_env)
            .expect_err("must fail");
        assert!(matches!(missing, ConfigError::Read { .. }));

        let path = dir.path().join("config.json");
        fs::write(&path, "{ broken").expect("write");
        let malformed = AppConfig::load_with_env(&path, no_env).expect_err("must fail");
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }
}
