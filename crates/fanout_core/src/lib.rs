//! Fanout core: pure result-report state machine and input helpers.
mod effect;
mod error;
mod filter;
mod input;
mod msg;
mod state;
mod summary;
mod update;

pub use effect::Effect;
pub use error::InputError;
pub use filter::OutputFilter;
pub use input::{collect_urls, read_urls, InputSource};
pub use msg::Msg;
pub use state::ReportState;
pub use summary::ReportSummary;
pub use update::update;
