use std::path::Path;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{Channel, DeliveryError, DeliveryFuture, Dispatcher, Notification};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Implicit TLS (SMTPS).
pub const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub sender: String,
    pub password: String,
    pub receiver: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .field("receiver", &self.receiver)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

/// Sends the notification as a plain-text mail with the chart attached,
/// authenticating as the sender over implicit TLS.
pub struct EmailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    timeout_ms: u64,
}

impl EmailDispatcher {
    pub fn new(settings: &EmailSettings) -> Result<Self, DeliveryError> {
        let from = parse_mailbox("sender", &settings.sender)?;
        let to = parse_mailbox("receiver", &settings.receiver)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|error| {
                DeliveryError::new(
                    Channel::Email,
                    format!("invalid SMTP host '{}': {error}", settings.smtp_host),
                )
            })?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    /// Builds the MIME message; reads the attachment from disk if present.
    pub async fn build_message(&self, notification: &Notification) -> Result<Message, DeliveryError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(notification.body.clone()));

        if let Some(path) = notification.attachment() {
            let content = tokio::fs::read(path).await.map_err(|error| {
                DeliveryError::new(
                    Channel::Email,
                    format!("cannot read attachment {}: {error}", path.display()),
                )
            })?;
            parts = parts.singlepart(
                Attachment::new(file_name(path)).body(content, content_type_for(path)),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.clone())
            .multipart(parts)
            .map_err(|error| DeliveryError::new(Channel::Email, format!("cannot build message: {error}")))
    }
}

impl Dispatcher for EmailDispatcher {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let message = self.build_message(notification).await?;
            debug!(to = %self.to, subject = %notification.subject, "sending email");

            let timeout = Duration::from_millis(self.timeout_ms);
            match tokio::time::timeout(timeout, self.transport.send(message)).await {
                Ok(Ok(_)) => {
                    info!(to = %self.to, "email alert sent");
                    Ok(())
                }
                Ok(Err(error)) => Err(DeliveryError::new(
                    Channel::Email,
                    format!("SMTP error: {error}"),
                )),
                Err(_) => Err(DeliveryError::new(
                    Channel::Email,
                    format!("SMTP send timed out after {}ms", self.timeout_ms),
                )),
            }
        })
    }
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse::<Mailbox>().map_err(|error| {
        DeliveryError::new(
            Channel::Email,
            format!("invalid {role} address '{address}': {error}"),
        )
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("chart"))
}

fn content_type_for(path: &Path) -> ContentType {
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}
