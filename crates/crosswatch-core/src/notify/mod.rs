//! Outbound alert channels.

mod email;
mod messaging;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;

use crate::signal::{CrossoverEvent, CrossoverKind};

pub use email::{EmailDispatcher, EmailSettings, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
pub use messaging::{MessagingDispatcher, MessagingSettings, TWILIO_BASE_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Messaging,
}

impl Channel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Messaging => "messaging",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{channel} delivery failed: {message}")]
pub struct DeliveryError {
    channel: Channel,
    message: String,
}

impl DeliveryError {
    pub fn new(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Fully formed alert, ready for any channel.
///
/// Channels that cannot carry files (messaging) ignore `attachment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

impl Notification {
    pub fn for_event(event: &CrossoverEvent) -> Self {
        let kind = event.kind();
        Self {
            subject: subject_for(kind),
            body: format!(
                "{side} Signal Detected:\n\
                 - {label} on {symbol}.\n\
                 - Bar: {date}.\n\
                 - Current RSI: {rsi:.2}.",
                side = kind.side(),
                label = kind.label(),
                symbol = event.symbol(),
                date = event.date(),
                rsi = event.momentum_at_signal(),
            ),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    pub fn attachment(&self) -> Option<&Path> {
        self.attachment.as_deref()
    }
}

pub fn subject_for(kind: CrossoverKind) -> String {
    format!("{} Signal - {}", kind.side(), kind.label())
}

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// One alert transport. Implementations apply their own request timeout.
pub trait Dispatcher: Send + Sync {
    fn channel(&self) -> Channel;

    fn send<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a>;
}
