use std::fmt;
use std::str::FromStr;

use crate::InputError;

/// Which results reach the primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFilter {
    #[default]
    All,
    Success,
    Failure,
}

impl OutputFilter {
    pub fn admits(self, succeeded: bool) -> bool {
        match self {
            OutputFilter::All => true,
            OutputFilter::Success => succeeded,
            OutputFilter::Failure => !succeeded,
        }
    }
}

impl FromStr for OutputFilter {
    type Err = InputError;

    /// Accepts the full names and their single-letter aliases.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "a" | "all" => Ok(OutputFilter::All),
            "s" | "success" => Ok(OutputFilter::Success),
            "f" | "failure" => Ok(OutputFilter::Failure),
            other => Err(InputError::InvalidFilter(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFilter::All => write!(f, "all"),
            OutputFilter::Success => write!(f, "success"),
            OutputFilter::Failure => write!(f, "failure"),
        }
    }
}
