use std::error::Error as StdError;
use std::time::Duration;

use fanout_logging::engine_trace;
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT,
};

use crate::decode::decode_body;
use crate::{FailureKind, FetchError};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml";
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Client-wide fallback; the per-call timeout passed to `fetch` overrides it.
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A single HTTP GET returning the body as text.
///
/// Only transport-level problems are errors; any HTTP status counts as a
/// successful fetch.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, describe(&err)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .headers(browser_headers())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        // Dropping the stream on error releases the connection.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_body_error)?;
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_body(&bytes, content_type.as_deref());
        engine_trace!(
            "fetched url={} status={} bytes={} encoding={} lossy={}",
            url,
            status,
            bytes.len(),
            decoded.encoding_label,
            decoded.had_errors
        );
        Ok(decoded.text)
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
    );
    headers
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let message = describe(&err);
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, message);
    }
    if err.is_connect() {
        return FetchError::new(FailureKind::Connect, message);
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, message);
    }
    FetchError::new(FailureKind::Network, message)
}

fn map_body_error(err: reqwest::Error) -> FetchError {
    let message = describe(&err);
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, message);
    }
    FetchError::new(FailureKind::Body, message)
}

/// Error message including its source chain, e.g. the OS-level refusal
/// behind a connect error.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
