use crate::{OutputFilter, ReportSummary};

/// Consumer-side state for one fetch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportState {
    filter: OutputFilter,
    show_progress: bool,
    summary: ReportSummary,
}

impl ReportState {
    /// `show_progress` should already account for whether output goes to a
    /// file; progress lines share the terminal otherwise.
    pub fn new(total: usize, filter: OutputFilter, show_progress: bool) -> Self {
        Self {
            filter,
            show_progress,
            summary: ReportSummary {
                total,
                ..ReportSummary::default()
            },
        }
    }

    pub fn filter(&self) -> OutputFilter {
        self.filter
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    pub fn is_complete(&self) -> bool {
        self.summary.done >= self.summary.total
    }

    pub(crate) fn record(&mut self, succeeded: bool) {
        self.summary.done += 1;
        if succeeded {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed += 1;
        }
    }
}
