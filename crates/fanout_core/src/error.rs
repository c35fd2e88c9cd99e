use std::io;

use thiserror::Error;

/// Problems with what the user asked for. Raised before any fetch starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no URLs provided. Use command arguments, --input, or stdin")]
    NoUrls,
    #[error("invalid filter value: {0}. Use (a)ll, (s)uccess, or (f)ailure")]
    InvalidFilter(String),
    #[error("failed to read input {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },
}
