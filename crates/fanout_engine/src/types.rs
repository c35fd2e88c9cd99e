use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Immutable parameter bundle for one fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    urls: Vec<String>,
    concurrency: usize,
    timeout: Duration,
    retry: u8,
    url_only: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("no URLs provided")]
    NoUrls,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

impl TaskDescriptor {
    pub fn new(
        urls: Vec<String>,
        concurrency: usize,
        timeout: Duration,
        retry: u8,
        url_only: bool,
    ) -> Result<Self, TaskError> {
        if urls.is_empty() {
            return Err(TaskError::NoUrls);
        }
        if concurrency == 0 {
            return Err(TaskError::ZeroConcurrency);
        }
        if timeout.is_zero() {
            return Err(TaskError::ZeroTimeout);
        }
        Ok(Self {
            urls,
            concurrency,
            timeout,
            retry,
            url_only,
        })
    }

    /// Target URLs in submission order; duplicates are kept.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Applied to each fetch attempt independently.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry(&self) -> u8 {
        self.retry
    }

    /// Total attempts per URL: the first try plus `retry` retries.
    pub fn attempts(&self) -> u32 {
        u32::from(self.retry) + 1
    }

    pub fn url_only(&self) -> bool {
        self.url_only
    }
}

/// Lifecycle of one task execution. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPhase {
    Idle,
    Dispatching,
    Draining,
    Closed,
}

/// One URL's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub url: String,
    /// The body on success, the URL in url-only mode, empty otherwise.
    pub payload: String,
    pub failure: Option<FetchError>,
}

impl FetchResult {
    pub(crate) fn from_outcome(
        url: String,
        outcome: Result<String, FetchError>,
        url_only: bool,
    ) -> Self {
        let (payload, failure) = match outcome {
            Ok(body) => (body, None),
            Err(err) => (String::new(), Some(err)),
        };
        let payload = if url_only { url.clone() } else { payload };
        Self {
            url,
            payload,
            failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "task cancelled")
    }

    /// Whether another attempt could produce a different outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind,
            FailureKind::InvalidUrl | FailureKind::Cancelled | FailureKind::ProcessingError
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidUrl,
    Timeout,
    Connect,
    Body,
    Network,
    Cancelled,
    ProcessingError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connect => write!(f, "connection failed"),
            FailureKind::Body => write!(f, "body read failed"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::ProcessingError => write!(f, "processing error"),
        }
    }
}
