use crosswatch_core::{AlertError, ConfigError, LedgerError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid log filter '{directive}': {message}")]
    LogFilter { directive: String, message: String },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::LogFilter { .. } => 2,
            Self::Alert(error) => match error {
                AlertError::Config(_) => 2,
                AlertError::Fetch(_) => 3,
                AlertError::InvalidInput(_) => 4,
                AlertError::Ledger(_) => 5,
                AlertError::Delivery(_) => 6,
                AlertError::Chart(_) => 7,
            },
            Self::Ledger(_) => 5,
            Self::Logging(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosswatch_core::notify::Channel;
    use crosswatch_core::{DeliveryError, InvalidInput, SourceError};

    #[test]
    fn exit_codes_follow_error_category() {
        let cases: Vec<(CliError, u8)> = vec![
            (ConfigError::MissingKey { key: String::from("email.sender") }.into(), 2),
            (AlertError::from(SourceError::network("down")).into(), 3),
            (AlertError::from(InvalidInput::EmptySeries).into(), 4),
            (
                LedgerError::Locked {
                    path: "alerts_log.json".into(),
                    lock: "alerts_log.json.lock".into(),
                }
                .into(),
                5,
            ),
            (AlertError::from(DeliveryError::new(Channel::Email, "rejected")).into(), 6),
            (std::io::Error::new(std::io::ErrorKind::Other, "stdout closed").into(), 10),
        ];

        for (error, expected) in cases {
            assert_eq!(error.exit_code(), expected, "{error}");
        }
    }
}
