//! Fanout engine: bounded-concurrency HTTP fetching.
mod decode;
mod fetch;
mod runner;
mod types;

pub use decode::{decode_body, DecodedBody};
pub use fetch::{
    FetchSettings, Fetcher, ReqwestFetcher, BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE,
    BROWSER_USER_AGENT,
};
pub use runner::{ResultStream, TaskRunner};
pub use types::{FailureKind, FetchError, FetchResult, TaskDescriptor, TaskError, TaskPhase};

// Re-exported so callers can cancel without depending on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
