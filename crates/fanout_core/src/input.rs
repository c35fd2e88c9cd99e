use std::io::BufRead;
use std::path::PathBuf;

use crate::InputError;

/// Where additional URLs come from besides positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` means standard input; anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::File(path) => path.display().to_string(),
        }
    }
}

/// Trimmed, non-empty lines of `reader`, in order. Duplicates are kept.
pub fn read_urls<R: BufRead>(reader: R, source: &InputSource) -> Result<Vec<String>, InputError> {
    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source_err| InputError::Read {
            origin: source.describe(),
            source: source_err,
        })?;
        let line = line.trim();
        if !line.is_empty() {
            urls.push(line.to_string());
        }
    }
    Ok(urls)
}

/// Positional arguments first, then lines from the optional input.
///
/// Fails with [`InputError::NoUrls`] when nothing usable remains.
pub fn collect_urls(args: &[String], extra: Vec<String>) -> Result<Vec<String>, InputError> {
    let urls: Vec<String> = args
        .iter()
        .map(|arg| arg.trim())
        .filter(|arg| !arg.is_empty())
        .map(ToOwned::to_owned)
        .chain(extra)
        .collect();
    if urls.is_empty() {
        return Err(InputError::NoUrls);
    }
    Ok(urls)
}
