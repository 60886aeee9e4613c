use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::market_data::{FetchRequest, MarketDataSource, SourceError};
use crate::retry::RetryConfig;
use crate::{PriceBar, PriceSeries, UtcDateTime};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";

/// Spot kline adapter for the Binance REST API.
#[derive(Clone)]
pub struct BinanceSource {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl Default for BinanceSource {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::default()),
            base_url: String::from(BINANCE_BASE_URL),
            auth: HttpAuth::None,
            retry: RetryConfig::default(),
            timeout_ms: 10_000,
        }
    }
}

impl BinanceSource {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            ..Self::default()
        }
    }

    /// Klines are public; the key only lifts the request weight limits.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.auth = match api_key {
            Some(value) if !value.is_empty() => HttpAuth::Header {
                name: String::from("X-MBX-APIKEY"),
                value,
            },
            _ => HttpAuth::None,
        };
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn klines_url(&self, request: &FetchRequest) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            urlencoding::encode(&request.symbol.exchange_code()),
            request.timeframe.as_str(),
            request.limit
        )
    }

    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse, SourceError> {
        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.retry.max_retries;
            match self.http_client.execute(request.clone()).await {
                Ok(response)
                    if can_retry
                        && !response.is_success()
                        && self.retry.should_retry_status(response.status) =>
                {
                    warn!(status = response.status, attempt, "binance throttled or unavailable, retrying");
                }
                Ok(response) => return Ok(response),
                Err(error) if can_retry && self.retry.should_retry_error(&error) => {
                    warn!(error = %error, attempt, "binance transport failure, retrying");
                }
                Err(error) => {
                    return Err(SourceError::network(format!(
                        "binance transport error: {}",
                        error.message()
                    )))
                }
            }

            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

impl MarketDataSource for BinanceSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.klines_url(request);
            debug!(%url, "requesting klines");

            let http_request = HttpRequest::get(url)
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms);
            let response = self.execute_with_retry(http_request).await?;

            if !response.is_success() {
                return Err(classify_failure(&response));
            }

            let bars = parse_klines(&response.body)?;
            PriceSeries::new(request.symbol.clone(), request.timeframe, bars)
                .map_err(|error| SourceError::invalid_response(error.to_string()))
        })
    }
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

fn classify_failure(response: &HttpResponse) -> SourceError {
    let detail = serde_json::from_str::<BinanceErrorBody>(&response.body)
        .map(|body| format!("code {}: {}", body.code, body.msg))
        .unwrap_or_else(|_| String::from("no error payload"));

    match response.status {
        401 | 403 => SourceError::auth(format!(
            "binance rejected credentials (status {}, {detail})",
            response.status
        )),
        status => SourceError::exchange(format!("binance returned status {status} ({detail})")),
    }
}

/// Kline rows are positional arrays: `[open_time, open, high, low, close, volume, ...]`
/// with prices encoded as decimal strings.
fn parse_klines(body: &str) -> Result<Vec<PriceBar>, SourceError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| SourceError::invalid_response(format!("failed to parse klines: {e}")))?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| parse_kline_row(index, row))
        .collect()
}

fn parse_kline_row(index: usize, row: &[Value]) -> Result<PriceBar, SourceError> {
    if row.len() < 6 {
        return Err(SourceError::invalid_response(format!(
            "kline {index} has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time = row[0].as_i64().ok_or_else(|| {
        SourceError::invalid_response(format!("kline {index} open time is not an integer"))
    })?;
    let ts = UtcDateTime::from_unix_millis(open_time)
        .map_err(|e| SourceError::invalid_response(e.to_string()))?;

    let number = |position: usize, field: &str| -> Result<f64, SourceError> {
        let value = &row[position];
        value
            .as_str()
            .and_then(|raw| raw.parse::<f64>().ok())
            .or_else(|| value.as_f64())
            .ok_or_else(|| {
                SourceError::invalid_response(format!("kline {index} field '{field}' is not numeric"))
            })
    };

    PriceBar::new(
        ts,
        number(1, "open")?,
        number(2, "high")?,
        number(3, "low")?,
        number(4, "close")?,
        number(5, "volume")?,
    )
    .map_err(|e| SourceError::invalid_response(format!("kline {index}: {e}")))
}
