use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use fanout_engine::{
    CancellationToken, FailureKind, FetchError, FetchResult, FetchSettings, Fetcher,
    TaskDescriptor, TaskPhase, TaskRunner,
};
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(fanout_logging::initialize_for_tests);
}

/// Deterministic fetcher that records how many calls overlap.
struct StubFetcher {
    delay: Duration,
    failing: Vec<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing: Vec::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|failing| failing == url) {
            Err(FetchError::new(FailureKind::Connect, "connection refused"))
        } else {
            Ok(format!("body of {url}"))
        }
    }
}

/// Fails with the given error until a URL has been attempted `failures` times.
struct FlakyFetcher {
    failures: usize,
    error: FetchError,
    attempts: Mutex<HashMap<String, usize>>,
}

impl FlakyFetcher {
    fn new(failures: usize, kind: FailureKind) -> Self {
        Self {
            failures,
            error: FetchError::new(kind, "flaky"),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts_for(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if attempt <= self.failures {
            Err(self.error.clone())
        } else {
            Ok("recovered".to_string())
        }
    }
}

/// Each fetch waits until the test hands out one release permit.
struct GatedFetcher {
    release: Arc<Semaphore>,
}

#[async_trait::async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.release.acquire().await.unwrap().forget();
        Ok(format!("body of {url}"))
    }
}

struct PanickyFetcher;

#[async_trait::async_trait]
impl Fetcher for PanickyFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        if url.contains("boom") {
            panic!("fetcher blew up on {url}");
        }
        Ok("fine".to_string())
    }
}

fn urls(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("http://host{i}.test/")).collect()
}

fn task(urls: Vec<String>, concurrency: usize, retry: u8, url_only: bool) -> TaskDescriptor {
    TaskDescriptor::new(urls, concurrency, Duration::from_secs(5), retry, url_only).unwrap()
}

fn sorted(mut results: Vec<FetchResult>) -> Vec<FetchResult> {
    results.sort_by(|a, b| a.url.cmp(&b.url));
    results
}

fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/fail")
}

#[tokio::test]
async fn every_url_yields_exactly_one_result() {
    init_logging();
    let all = urls(25);
    let fetcher = StubFetcher::new(Duration::from_millis(5))
        .failing_on(&all[3])
        .failing_on(&all[17]);
    let runner = TaskRunner::new(Arc::new(fetcher));

    let results = runner.run(task(all.clone(), 4, 0, false)).collect_all().await;

    assert_eq!(results.len(), 25);
    let mut seen: Vec<_> = results.iter().map(|r| r.url.clone()).collect();
    seen.sort();
    let mut expected = all.clone();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(results.iter().filter(|r| !r.is_success()).count(), 2);
}

#[tokio::test]
async fn duplicate_urls_are_each_fetched() {
    let url = "http://same.test/".to_string();
    let fetcher = Arc::new(StubFetcher::new(Duration::ZERO));
    let runner = TaskRunner::new(fetcher.clone());

    let results = runner
        .run(task(vec![url.clone(), url.clone(), url], 2, 0, false))
        .collect_all()
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_concurrency() {
    let fetcher = Arc::new(StubFetcher::new(Duration::from_millis(20)));
    let runner = TaskRunner::new(fetcher.clone());

    let results = runner.run(task(urls(40), 3, 0, false)).collect_all().await;

    assert_eq!(results.len(), 40);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {peak}");
    assert!(peak >= 2, "gate never let fetches overlap");
}

#[tokio::test]
async fn concurrency_of_one_serializes_fetches() {
    let fetcher = Arc::new(StubFetcher::new(Duration::from_millis(50)));
    let runner = TaskRunner::new(fetcher.clone());

    let started = Instant::now();
    let results = runner.run(task(urls(5), 1, 0, false)).collect_all().await;

    assert_eq!(results.len(), 5);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_runs_yield_the_same_result_set() {
    let all = urls(12);
    let fetcher = StubFetcher::new(Duration::from_millis(1)).failing_on(&all[5]);
    let runner = TaskRunner::new(Arc::new(fetcher));

    let first = runner.run(task(all.clone(), 5, 0, false)).collect_all().await;
    let second = runner.run(task(all, 5, 0, false)).collect_all().await;

    assert_eq!(sorted(first), sorted(second));
}

#[tokio::test]
async fn url_only_payload_is_the_submitted_url() {
    let all = urls(6);
    let fetcher = StubFetcher::new(Duration::ZERO).failing_on(&all[0]).failing_on(&all[4]);
    let runner = TaskRunner::new(Arc::new(fetcher));

    let results = runner.run(task(all, 3, 0, true)).collect_all().await;

    assert_eq!(results.len(), 6);
    for result in &results {
        assert_eq!(result.payload, result.url);
    }
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 4);
}

#[tokio::test]
async fn result_stream_works_as_a_futures_stream_and_ends_closed() {
    let runner = TaskRunner::new(Arc::new(StubFetcher::new(Duration::from_millis(2))));
    let mut stream = runner.run(task(urls(4), 2, 0, false));
    assert_eq!(stream.total(), 4);

    let mut count = 0;
    while let Some(result) = stream.next().await {
        assert!(result.payload.starts_with("body of "));
        count += 1;
    }

    assert_eq!(count, 4);
    assert_eq!(stream.phase(), TaskPhase::Closed);
}

#[tokio::test]
async fn phases_advance_in_order_without_skipping() {
    init_logging();
    let release = Arc::new(Semaphore::new(0));
    let runner = TaskRunner::new(Arc::new(GatedFetcher {
        release: release.clone(),
    }));
    let stream = runner.run(task(urls(2), 1, 0, false));
    let mut phases = stream.watch_phase();
    let mut seen = vec![*phases.borrow_and_update()];

    // First URL holds the only slot, so dispatch waits on the gate.
    phases.changed().await.unwrap();
    seen.push(*phases.borrow_and_update());

    // First fetch finishes, second URL is admitted, dispatch starts joining.
    release.add_permits(1);
    phases.changed().await.unwrap();
    seen.push(*phases.borrow_and_update());

    release.add_permits(1);
    let results = stream.collect_all().await;
    seen.push(*phases.borrow_and_update());

    assert_eq!(results.len(), 2);
    assert_eq!(
        seen,
        vec![
            TaskPhase::Idle,
            TaskPhase::Dispatching,
            TaskPhase::Draining,
            TaskPhase::Closed,
        ]
    );
}

#[tokio::test]
async fn mixed_targets_report_successes_and_transport_failure() {
    init_logging();
    let server = MockServer::start().await;
    for route in ["/ok", "/ok2"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;
    }
    let ok = format!("{}/ok", server.uri());
    let ok2 = format!("{}/ok2", server.uri());
    let fail = refused_url();

    let runner = TaskRunner::with_settings(FetchSettings::default()).unwrap();
    let results = runner
        .run(task(vec![ok, fail.clone(), ok2], 2, 0, false))
        .collect_all()
        .await;

    assert_eq!(results.len(), 3);
    let successes: Vec<_> = results.iter().filter(|r| r.is_success()).collect();
    assert_eq!(successes.len(), 2);
    assert!(successes.iter().all(|r| r.payload == "pong"));

    let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url, fail);
    assert_eq!(failed[0].payload, "");
    assert_eq!(failed[0].failure.as_ref().unwrap().kind, FailureKind::Connect);
}

#[tokio::test]
async fn unresponsive_target_times_out_instead_of_blocking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let runner = TaskRunner::with_settings(FetchSettings::default()).unwrap();
    let descriptor = TaskDescriptor::new(
        vec![format!("{}/hang", server.uri())],
        1,
        Duration::from_secs(1),
        0,
        false,
    )
    .unwrap();

    let started = Instant::now();
    let results = runner.run(descriptor).collect_all().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].failure.as_ref().unwrap().kind,
        FailureKind::Timeout
    );
}

#[tokio::test]
async fn retries_until_success_within_budget() {
    let fetcher = Arc::new(FlakyFetcher::new(2, FailureKind::Connect));
    let runner = TaskRunner::new(fetcher.clone());

    let results = runner
        .run(task(vec!["http://flaky.test/".into()], 1, 2, false))
        .collect_all()
        .await;

    assert!(results[0].is_success());
    assert_eq!(results[0].payload, "recovered");
    assert_eq!(fetcher.attempts_for("http://flaky.test/"), 3);
}

#[tokio::test]
async fn only_the_final_attempt_is_reported() {
    let fetcher = Arc::new(FlakyFetcher::new(2, FailureKind::Timeout));
    let runner = TaskRunner::new(fetcher.clone());

    let results = runner
        .run(task(vec!["http://flaky.test/".into()], 1, 1, false))
        .collect_all()
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].failure.as_ref().unwrap().kind,
        FailureKind::Timeout
    );
    assert_eq!(fetcher.attempts_for("http://flaky.test/"), 2);
}

#[tokio::test]
async fn invalid_urls_are_not_retried() {
    let fetcher = Arc::new(FlakyFetcher::new(usize::MAX, FailureKind::InvalidUrl));
    let runner = TaskRunner::new(fetcher.clone());

    let results = runner
        .run(task(vec!["bogus".into()], 1, 5, false))
        .collect_all()
        .await;

    assert_eq!(
        results[0].failure.as_ref().unwrap().kind,
        FailureKind::InvalidUrl
    );
    assert_eq!(fetcher.attempts_for("bogus"), 1);
}

#[tokio::test]
async fn cancellation_still_accounts_for_every_url() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::new(Duration::from_secs(10)));
    let runner = TaskRunner::new(fetcher.clone());
    let cancel = CancellationToken::new();

    let mut stream = runner.run_with_cancel(task(urls(6), 2, 0, false), cancel.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let started = Instant::now();
    let mut results = Vec::new();
    while let Some(result) = stream.recv().await {
        results.push(result);
    }

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results.len(), 6);
    assert!(results
        .iter()
        .all(|r| r.failure.as_ref().map(|f| f.kind) == Some(FailureKind::Cancelled)));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stream.phase(), TaskPhase::Closed);
}

#[tokio::test]
async fn panicking_fetch_is_reported_as_a_failed_result() {
    init_logging();
    let runner = TaskRunner::new(Arc::new(PanickyFetcher));

    let results = runner
        .run(task(
            vec![
                "http://a.test/".into(),
                "http://boom.test/".into(),
                "http://b.test/".into(),
            ],
            3,
            2,
            false,
        ))
        .collect_all()
        .await;

    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url, "http://boom.test/");
    assert_eq!(
        failed[0].failure.as_ref().unwrap().kind,
        FailureKind::ProcessingError
    );
}
