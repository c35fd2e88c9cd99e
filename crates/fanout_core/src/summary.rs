/// Tally of drained results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    pub total: usize,
    pub done: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ReportSummary {
    pub fn done_percent(&self) -> f64 {
        percent(self.done, self.total)
    }

    pub fn failed_percent(&self) -> f64 {
        percent(self.failed, self.total)
    }

    /// `Total 4 Done 2 (50.00%): Succ: 1 Fail: 1 (25.00%)`
    pub fn progress_line(&self) -> String {
        format!(
            "Total {} Done {} ({:.2}%): Succ: {} Fail: {} ({:.2}%)",
            self.total,
            self.done,
            self.done_percent(),
            self.succeeded,
            self.failed,
            self.failed_percent()
        )
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    100.0 * part as f64 / whole as f64
}
