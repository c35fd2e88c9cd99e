use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::time::Duration;

use anyhow::Context;
use fanout_core::{
    collect_urls, read_urls, update, InputError, InputSource, Msg, ReportState, ReportSummary,
};
use fanout_engine::{
    CancellationToken, FetchResult, FetchSettings, ResultStream, TaskDescriptor, TaskRunner,
};
use fanout_logging::{engine_info, engine_warn};

use crate::cli::Cli;
use crate::effects::EffectRunner;

pub async fn run(cli: Cli) -> anyhow::Result<ReportSummary> {
    let extra = match cli.input.as_deref() {
        Some(arg) => read_input(InputSource::from_arg(arg)).await?,
        None => Vec::new(),
    };
    let urls = collect_urls(&cli.urls, extra)?;

    let timeout = Duration::from_secs(u64::from(cli.timeout));
    let task = TaskDescriptor::new(
        urls,
        usize::from(cli.concurrency),
        timeout,
        cli.retry,
        cli.url_only,
    )
    .context("invalid fetch parameters")?;

    let output: Box<dyn Write> = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let runner =
        TaskRunner::with_settings(fetch_settings(timeout)).context("failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    engine_info!(
        "fetching {} urls concurrency={} timeout={}s retry={}",
        task.urls().len(),
        cli.concurrency,
        cli.timeout,
        cli.retry
    );
    let stream = runner.run_with_cancel(task, cancel);
    let state = ReportState::new(stream.total(), cli.filter, cli.shows_progress());
    let effects = EffectRunner::new(output, io::stdout(), io::stderr());

    let summary = drain(stream, state, effects).await?;
    engine_info!(
        "done: {} succeeded, {} failed of {}",
        summary.succeeded,
        summary.failed,
        summary.total
    );
    Ok(summary)
}

/// Feeds every streamed result through the report state machine until the
/// stream is exhausted.
async fn drain<O: Write, P: Write, D: Write>(
    mut stream: ResultStream,
    mut state: ReportState,
    mut effects: EffectRunner<O, P, D>,
) -> anyhow::Result<ReportSummary> {
    while let Some(result) = stream.recv().await {
        let (next, pending) = update(state, to_msg(result));
        state = next;
        effects.apply(pending).context("failed to write results")?;
    }
    effects.finish().context("failed to flush results")?;
    Ok(state.summary())
}

fn to_msg(result: FetchResult) -> Msg {
    Msg::ResultReceived {
        url: result.url,
        payload: result.payload,
        failure: result.failure.map(|err| err.to_string()),
    }
}

/// The caller's timeout bounds connection setup as well as the whole request.
fn fetch_settings(timeout: Duration) -> FetchSettings {
    FetchSettings {
        connect_timeout: timeout,
        request_timeout: timeout,
    }
}

/// Reads the input on the blocking pool.
async fn read_input(source: InputSource) -> anyhow::Result<Vec<String>> {
    let urls = tokio::task::spawn_blocking(move || read_source(&source))
        .await
        .context("input reader stopped unexpectedly")??;
    Ok(urls)
}

fn read_source(source: &InputSource) -> Result<Vec<String>, InputError> {
    match source {
        InputSource::Stdin => read_urls(io::stdin().lock(), source),
        InputSource::File(path) => {
            let file = File::open(path).map_err(|err| InputError::Read {
                origin: source.describe(),
                source: err,
            })?;
            read_urls(BufReader::new(file), source)
        }
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        engine_warn!("interrupt received; cancelling outstanding fetches");
        cancel.cancel();
    }
}
