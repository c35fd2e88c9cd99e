/// Output the caller performs after a state update, in the order returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write one payload line to the primary output.
    Emit(String),
    /// Describe a failed fetch on the diagnostic stream, regardless of filter.
    ReportFailure { url: String, cause: String },
    /// Print a running progress line.
    Progress(String),
}
