use std::path::PathBuf;

use clap::{ArgAction, Parser};
use fanout_core::{InputError, OutputFilter};

#[derive(Debug, Parser)]
#[command(name = "fanout")]
#[command(about = "Send HTTP GET requests to one or many URLs concurrently")]
#[command(version)]
pub struct Cli {
    /// URLs to fetch
    pub urls: Vec<String>,

    /// Input file containing URLs (one per line). Use '-' for stdin
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output only URLs instead of full HTTP responses
    #[arg(short, long)]
    pub url_only: bool,

    /// Filter output: (a)ll, (s)uccess, or (f)ailure
    #[arg(short, long, default_value = "all", value_parser = parse_filter)]
    pub filter: OutputFilter,

    /// Write results to the specified file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show progress after each result (only with --output)
    #[arg(short, long)]
    pub progress: bool,

    /// Maximum number of concurrent requests
    #[arg(short, long, default_value_t = 200)]
    pub concurrency: u16,

    /// Timeout in seconds for each request
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u8,

    /// Number of times to retry failed requests
    #[arg(short, long, default_value_t = 0)]
    pub retry: u8,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Progress lines only make sense when results do not share stdout.
    pub fn shows_progress(&self) -> bool {
        self.progress && self.output.is_some()
    }
}

fn parse_filter(value: &str) -> Result<OutputFilter, InputError> {
    value.parse()
}
