use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::{Channel, DeliveryError, DeliveryFuture, Dispatcher, Notification};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};

pub const TWILIO_BASE_URL: &str = "https://api.twilio.com";

#[derive(Clone, PartialEq, Eq)]
pub struct MessagingSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender address, e.g. `whatsapp:+14155238886`.
    pub from_number: String,
    pub to_number: String,
    pub base_url: String,
}

impl std::fmt::Debug for MessagingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Twilio-compatible messages API. Sends the body only.
pub struct MessagingDispatcher {
    http_client: Arc<dyn HttpClient>,
    settings: MessagingSettings,
    auth: HttpAuth,
    timeout_ms: u64,
}

impl MessagingDispatcher {
    pub fn new(settings: MessagingSettings) -> Self {
        Self::with_http_client(settings, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(settings: MessagingSettings, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = HttpAuth::Basic {
            username: settings.account_sid.clone(),
            password: settings.auth_token.clone(),
        };
        Self {
            http_client,
            settings,
            auth,
            timeout_ms: 15_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.settings.account_sid)
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

impl Dispatcher for MessagingDispatcher {
    fn channel(&self) -> Channel {
        Channel::Messaging
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let request = HttpRequest::post(self.messages_url())
                .with_auth(&self.auth)
                .with_form(&[
                    ("To", self.settings.to_number.as_str()),
                    ("From", self.settings.from_number.as_str()),
                    ("Body", notification.body.as_str()),
                ])
                .with_timeout_ms(self.timeout_ms);
            debug!(to = %self.settings.to_number, "posting message");

            let response = self.http_client.execute(request).await.map_err(|error| {
                DeliveryError::new(Channel::Messaging, format!("transport error: {error}"))
            })?;

            if !response.is_success() {
                let detail = match serde_json::from_str::<ApiErrorBody>(&response.body) {
                    Ok(ApiErrorBody {
                        code: Some(code),
                        message: Some(message),
                    }) => format!("{message} (code {code})"),
                    Ok(ApiErrorBody {
                        message: Some(message),
                        ..
                    }) => message,
                    _ => String::from("no error detail"),
                };
                return Err(DeliveryError::new(
                    Channel::Messaging,
                    format!("HTTP {}: {detail}", response.status),
                ));
            }

            info!(to = %self.settings.to_number, "messaging alert sent");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::{HttpError, HttpMethod, HttpResponse};

    struct OneShotHttpClient {
        response: Mutex<Option<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl OneShotHttpClient {
        fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for OneShotHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests.lock().expect("lock").push(request);
            let next = self
                .response
                .lock()
                .expect("lock")
                .take()
                .unwrap_or_else(|| Err(HttpError::other("called twice")));
            Box::pin(async move { next })
        }
    }

    fn settings() -> MessagingSettings {
        MessagingSettings {
            account_sid: String::from("AC123"),
            auth_token: String::from("secret-token"),
            from_number: String::from("whatsapp:+14155238886"),
            to_number: String::from("whatsapp:+34600000000"),
            base_url: String::from("http://localhost:9/"),
        }
    }

    fn notification() -> Notification {
        Notification {
            subject: String::from("Sell Signal - Death Cross"),
            body: String::from("Sell Signal Detected:\n- Death Cross on ETH/USDT."),
            attachment: Some("/tmp/ignored.svg".into()),
        }
    }

    #[tokio::test]
    async fn posts_form_with_basic_auth() {
        let client = OneShotHttpClient::new(Ok(HttpResponse::new(201, r#"{"sid":"SM1"}"#)));
        let dispatcher = MessagingDispatcher::with_http_client(settings(), client.clone());

        dispatcher.send(&notification()).await.expect("send should succeed");

        let sent = client.requests.lock().expect("lock").clone();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost:9/2010-04-01/Accounts/AC123/Messages.json");
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Basic QUMxMjM6c2VjcmV0LXRva2Vu")
        );
        let body = request.body.as_deref().expect("form body");
        assert!(body.starts_with("To=whatsapp%3A%2B34600000000&From=whatsapp%3A%2B14155238886&Body="));
        assert!(body.contains("Death%20Cross"));
    }

    #[tokio::test]
    async fn api_error_surfaces_message() {
        let client = OneShotHttpClient::new(Ok(HttpResponse::new(
            400,
            r#"{"code":21211,"message":"Invalid 'To' Phone Number","status":400}"#,
        )));
        let dispatcher = MessagingDispatcher::with_http_client(settings(), client);

        let error = dispatcher.send(&notification()).await.expect_err("must fail");

        assert_eq!(error.channel(), Channel::Messaging);
        assert_eq!(error.message(), "HTTP 400: Invalid 'To' Phone Number (code 21211)");
    }

    #[tokio::test]
    async fn transport_failure_is_delivery_error() {
        let client = OneShotHttpClient::new(Err(HttpError::timeout("deadline exceeded")));
        let dispatcher = MessagingDispatcher::with_http_client(settings(), client);

        let error = dispatcher.send(&notification()).await.expect_err("must fail");
        assert!(error.message().starts_with("transport error"));
    }

    #[test]
    fn debug_output_redacts_token() {
        assert!(!format!("{:?}", settings()).contains("secret-token"));
    }
}
