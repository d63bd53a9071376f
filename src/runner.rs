//! Execution of one bounded import: read, parse, write, then signal.
//!
//! The [`Runner`] plays the part of the batch execution substrate. Input
//! lines are read in [`LineBundle`]s and every bundle is processed
//! independently: parse all lines, announce the groups to the
//! [`CompletionBarrier`], write them through the [`MutationSink`], redeliver
//! groups that failed transiently, and hand the final acknowledgments to the
//! barrier. A separate waiter thread blocks on the barrier and writes the
//! completion token once the input is sealed and every group is accounted for.
//!
//! The first malformed line or unrecovered write failure aborts the barrier,
//! stops further bundles from being scheduled, and is returned from
//! [`Runner::run`]. No token is written for a failed or cancelled run.

use crate::barrier::{AbortReason, CancellationToken, CompletionBarrier};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::metrics::{ImportMetrics, MetricsSnapshot};
use crate::record::{MutationGroup, RecordParser};
use crate::signal::write_completion_token;
use crate::sink::{MutationSink, SinkConfig, WriteAcknowledgment};
use crate::source::{BundleReader, Compression, LineBundle, expand_input};
use crate::store::WideColumnIO;
use crate::store::helpers::RetryConfig;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    /// Process bundles on a dedicated pool. `None` uses one thread per CPU.
    /// The configured maximum worker count caps either choice.
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

pub struct Runner {
    pub mode: ExecMode,
    /// Lines per unit of work.
    pub bundle_size: usize,
    pub retry: RetryConfig,
    pub sink: SinkConfig,
    pub compression: Compression,
    cancel: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::default(),
            bundle_size: 1000,
            retry: RetryConfig::default(),
            sink: SinkConfig::default(),
            compression: Compression::Auto,
            cancel: CancellationToken::new(),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub metrics: MetricsSnapshot,
    /// Input files in the order they were read.
    pub files: Vec<PathBuf>,
    pub completion_file: PathBuf,
}

impl Runner {
    #[must_use]
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bundle_size(mut self, bundle_size: usize) -> Self {
        self.bundle_size = bundle_size.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_sink_config(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Cancel runs through `token` instead of the runner's own token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels a run in progress from another thread.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Import `config.input` into `config.table` and emit the completion token.
    ///
    /// Blocks until the token is written or the run fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the run: an unreadable input, a malformed
    /// line ([`ImportError::Validation`]), a write that failed after
    /// redelivery ([`ImportError::Write`]), cancellation, or a failure to
    /// write the token itself. In every error case no token is written.
    pub fn run(
        &self,
        config: &ImportConfig,
        store: Arc<dyn WideColumnIO>,
    ) -> Result<ImportSummary, ImportError> {
        info!(
            table = %config.table,
            input = %config.input,
            completion_file = %config.completion_file.display(),
            schema = %config.schema,
            "starting import"
        );
        if config.completion_file.exists() {
            warn!(
                path = %config.completion_file.display(),
                "completion token already exists and will be replaced when this run completes"
            );
        }

        let files = expand_input(&config.input)?;
        if files.is_empty() {
            warn!(input = %config.input, "input matched no files");
        }

        let metrics = ImportMetrics::new();
        let barrier = CompletionBarrier::with_cancellation(self.cancel.clone());
        let worker = Worker {
            parser: RecordParser::new(config.schema.clone()),
            sink: MutationSink::new(store, config.table.clone()).with_config(self.sink),
            barrier: &barrier,
            metrics: &metrics,
            retry: self.retry,
            cancel: &self.cancel,
            failure: Mutex::new(None),
        };
        let bundles = BundleReader::new(files.clone(), self.bundle_size, self.compression);

        let (work, emitted) = thread::scope(|s| {
            let waiter = s.spawn(|| {
                barrier.wait_and_fire(|| write_completion_token(&config.completion_file, &config.input))
            });

            let guard = AbortOnPanic(&barrier);
            let work = self.process(bundles, &worker, config.max_workers);
            drop(guard);
            match &work {
                Ok(()) => barrier.seal(),
                Err(err) => barrier.abort(err.abort_reason()),
            }

            let emitted = waiter.join().unwrap_or_else(|_| {
                Err(ImportError::Barrier("completion waiter panicked".into()))
            });
            (work, emitted)
        });

        let snapshot = metrics.snapshot();
        snapshot.log_summary();

        work.map_err(cancelled)?;
        emitted.map_err(cancelled)?;

        info!(
            groups = snapshot.groups_written,
            files = files.len(),
            elapsed_ms = snapshot.elapsed_ms,
            "import complete"
        );
        Ok(ImportSummary {
            metrics: snapshot,
            files,
            completion_file: config.completion_file.clone(),
        })
    }

    fn process(
        &self,
        mut bundles: BundleReader,
        worker: &Worker<'_>,
        max_workers: Option<usize>,
    ) -> Result<(), ImportError> {
        let step = |bundle: Result<LineBundle, ImportError>| -> Result<(), ()> {
            bundle
                .and_then(|b| worker.process_bundle(b))
                .map_err(|err| worker.fail(err))
        };

        let outcome = match self.mode {
            ExecMode::Sequential => bundles.try_for_each(step),
            ExecMode::Parallel { threads } => {
                let mut threads = threads.unwrap_or_else(num_cpus::get);
                if let Some(max) = max_workers {
                    threads = threads.min(max);
                }
                let threads = threads.max(1);
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("tablebeam-worker-{i}"))
                    .build()
                    .map_err(|e| ImportError::Configuration(format!("cannot start worker pool: {e}")))?;
                debug!(threads, "processing bundles in parallel");
                pool.install(|| bundles.par_bridge().try_for_each(step))
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(()) => Err(worker.take_failure()),
        }
    }
}

/// Everything a bundle needs, shared by all workers of a run.
struct Worker<'a> {
    parser: RecordParser,
    sink: MutationSink,
    barrier: &'a CompletionBarrier,
    metrics: &'a ImportMetrics,
    retry: RetryConfig,
    cancel: &'a CancellationToken,
    /// First root-cause failure of the run.
    failure: Mutex<Option<ImportError>>,
}

impl Worker<'_> {
    fn process_bundle(&self, bundle: LineBundle) -> Result<(), ImportError> {
        if self.cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        self.metrics.add_lines_read(bundle.len() as u64);

        let mut groups = Vec::with_capacity(bundle.len());
        for (i, line) in bundle.lines.iter().enumerate() {
            match self.parser.parse_at(line, bundle.location(i)) {
                Ok(group) => groups.push(group),
                Err(err) => {
                    self.metrics.add_validation_failure();
                    error!(
                        location = %bundle.location(i),
                        expected = err.expected,
                        actual = err.actual,
                        raw = %err.raw_lossy(),
                        "malformed record"
                    );
                    return Err(err.into());
                }
            }
        }

        let count = groups.len() as u64;
        self.barrier.submit(count)?;
        self.metrics.add_groups_submitted(count);
        self.deliver(groups)
    }

    /// Write `groups`, redelivering transient failures, and acknowledge each
    /// group to the barrier exactly once.
    fn deliver(&self, groups: Vec<MutationGroup>) -> Result<(), ImportError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut pending = groups;
        let mut attempt = 1;
        loop {
            let acks = self.sink.write_all(&pending);
            let mut redeliver = Vec::new();
            for (group, ack) in pending.into_iter().zip(acks) {
                if ack.is_transient_failure() && attempt < max_attempts {
                    redeliver.push(group);
                } else {
                    self.settle(&group, &ack, attempt)?;
                }
            }
            if redeliver.is_empty() {
                return Ok(());
            }

            attempt += 1;
            let delay = self.retry.backoff(attempt);
            warn!(
                groups = redeliver.len(),
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "redelivering groups after transient write failure"
            );
            self.metrics.add_redeliveries(redeliver.len() as u64);
            thread::sleep(delay);
            pending = redeliver;
        }
    }

    fn settle(
        &self,
        group: &MutationGroup,
        ack: &WriteAcknowledgment,
        attempts: u32,
    ) -> Result<(), ImportError> {
        match ack.cause() {
            None => {
                self.metrics.add_groups_written(1, group.cells.len() as u64);
                self.barrier.acknowledge(ack)
            }
            Some(cause) => {
                self.metrics.add_write_failure();
                error!(
                    row_key = %ack.row_key_lossy(),
                    cause = %cause,
                    attempts,
                    "write failed"
                );
                self.barrier.acknowledge(ack)?;
                Err(ImportError::write(&ack.row_key, cause.clone()))
            }
        }
    }

    fn record(&self, err: ImportError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        // Another worker may have only seen the abort; keep the root cause.
        let replace = match slot.as_ref() {
            None => true,
            Some(ImportError::Aborted(_)) => !matches!(err, ImportError::Aborted(_)),
            Some(_) => false,
        };
        if replace {
            *slot = Some(err);
        }
    }

    fn fail(&self, err: ImportError) {
        self.barrier.abort(err.abort_reason());
        self.record(err);
    }

    fn take_failure(&self) -> ImportError {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| ImportError::Aborted(AbortReason::Failed("worker failed".into())))
    }
}

/// Aborts the barrier if the worker thread unwinds, so the waiter never hangs.
struct AbortOnPanic<'a>(&'a CompletionBarrier);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort(AbortReason::Failed("worker panicked".into()));
        }
    }
}

fn cancelled(err: ImportError) -> ImportError {
    match err {
        ImportError::Aborted(AbortReason::Cancelled) => ImportError::Cancelled,
        other => other,
    }
}
