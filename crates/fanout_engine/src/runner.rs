use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use fanout_logging::{engine_debug, engine_error, engine_warn};
use futures_util::{FutureExt, Stream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::{FailureKind, FetchError, FetchResult, TaskDescriptor, TaskPhase};

/// Runs task descriptors against a [`Fetcher`], bounded by each task's
/// concurrency limit.
#[derive(Clone)]
pub struct TaskRunner {
    fetcher: Arc<dyn Fetcher>,
}

impl TaskRunner {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Runner backed by a [`ReqwestFetcher`].
    pub fn with_settings(settings: FetchSettings) -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(ReqwestFetcher::new(settings)?)))
    }

    /// Starts the task and returns its result stream.
    ///
    /// Must be called from within a Tokio runtime. The stream yields exactly
    /// one result per submitted URL, in completion order, then ends.
    pub fn run(&self, task: TaskDescriptor) -> ResultStream {
        self.run_with_cancel(task, CancellationToken::new())
    }

    /// Like [`TaskRunner::run`], but stops early once `cancel` fires: URLs not
    /// yet admitted and fetches still in flight report [`FailureKind::Cancelled`].
    pub fn run_with_cancel(&self, task: TaskDescriptor, cancel: CancellationToken) -> ResultStream {
        let total = task.urls().len();
        let (result_tx, result_rx) = mpsc::channel(task.concurrency());
        let (phase_tx, phase_rx) = watch::channel(TaskPhase::Idle);

        tokio::spawn(dispatch(
            self.fetcher.clone(),
            task,
            result_tx,
            phase_tx,
            cancel,
        ));

        ResultStream {
            rx: result_rx,
            phase: phase_rx,
            total,
        }
    }
}

/// Unordered results of one task. Exhaustion means every URL is accounted for.
pub struct ResultStream {
    rx: mpsc::Receiver<FetchResult>,
    phase: watch::Receiver<TaskPhase>,
    total: usize,
}

impl ResultStream {
    /// Number of results the stream will yield.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn phase(&self) -> TaskPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase transition of this task.
    pub fn watch_phase(&self) -> watch::Receiver<TaskPhase> {
        self.phase.clone()
    }

    pub async fn recv(&mut self) -> Option<FetchResult> {
        self.rx.recv().await
    }

    pub async fn collect_all(mut self) -> Vec<FetchResult> {
        let mut results = Vec::with_capacity(self.total);
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }
}

impl Stream for ResultStream {
    type Item = FetchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.total))
    }
}

async fn dispatch(
    fetcher: Arc<dyn Fetcher>,
    task: TaskDescriptor,
    result_tx: mpsc::Sender<FetchResult>,
    phase_tx: watch::Sender<TaskPhase>,
    cancel: CancellationToken,
) {
    let task = Arc::new(task);
    let gate = Arc::new(Semaphore::new(task.concurrency()));
    let mut workers = JoinSet::new();

    set_phase(&phase_tx, TaskPhase::Dispatching);
    engine_debug!(
        "dispatching {} urls concurrency={} timeout={:?} attempts={}",
        task.urls().len(),
        task.concurrency(),
        task.timeout(),
        task.attempts()
    );

    for url in task.urls() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = gate.clone().acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit else {
            let result =
                FetchResult::from_outcome(url.clone(), Err(FetchError::cancelled()), task.url_only());
            if result_tx.send(result).await.is_err() {
                break;
            }
            continue;
        };

        if result_tx.is_closed() {
            engine_debug!("result stream dropped; stopping dispatch");
            break;
        }

        workers.spawn(run_worker(
            fetcher.clone(),
            task.clone(),
            url.clone(),
            permit,
            cancel.clone(),
            result_tx.clone(),
        ));
    }

    set_phase(&phase_tx, TaskPhase::Draining);
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            engine_error!("fetch worker ended abnormally: {}", err);
        }
    }

    if cancel.is_cancelled() {
        engine_warn!("task cancelled before all urls completed");
    }
    set_phase(&phase_tx, TaskPhase::Closed);
    // Last sender: dropping it exhausts the stream.
    drop(result_tx);
}

async fn run_worker(
    fetcher: Arc<dyn Fetcher>,
    task: Arc<TaskDescriptor>,
    url: String,
    permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
    result_tx: mpsc::Sender<FetchResult>,
) {
    let outcome = AssertUnwindSafe(fetch_with_retry(fetcher.as_ref(), &task, &url, &cancel))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            engine_warn!("fetch of {} panicked", url);
            Err(FetchError::new(FailureKind::ProcessingError, "fetch panicked"))
        });
    drop(permit);

    let result = FetchResult::from_outcome(url, outcome, task.url_only());
    // A closed receiver means the caller stopped listening.
    let _ = result_tx.send(result).await;
}

/// Up to `task.attempts()` tries; only the last outcome is reported.
async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    task: &TaskDescriptor,
    url: &str,
    cancel: &CancellationToken,
) -> Result<String, FetchError> {
    let attempts = task.attempts();
    let mut attempt = 1;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::cancelled()),
            outcome = fetcher.fetch(url, task.timeout()) => outcome,
        };

        match outcome {
            Err(err) if attempt < attempts && err.is_retryable() => {
                attempt += 1;
                engine_debug!(
                    "retrying url={} attempt={}/{} after {}",
                    url,
                    attempt,
                    attempts,
                    err
                );
            }
            outcome => return outcome,
        }
    }
}

fn set_phase(phase_tx: &watch::Sender<TaskPhase>, phase: TaskPhase) {
    let previous = phase_tx.send_replace(phase);
    engine_debug!("task phase {:?} -> {:?}", previous, phase);
}
