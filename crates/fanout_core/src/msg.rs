#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// One result drained from the fetch stream.
    ResultReceived {
        url: String,
        payload: String,
        /// Failure description; `None` for a successful fetch.
        failure: Option<String>,
    },
}
