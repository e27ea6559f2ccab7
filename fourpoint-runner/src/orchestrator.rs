//! Bounded worker pool for per-symbol fetch jobs.
//!
//! Jobs run on a dedicated rayon pool and report back over a channel, so they
//! complete in any order. A failed or panicking job becomes a tagged
//! [`JobFailure`]; it never cancels or blocks the rest of the batch.
//!
//! Wall time is bounded: each call gets `per_call_timeout × (max_retries + 1)`
//! plus the retry backoff, a job gets that once per HTTP call it makes, and
//! each wave of `workers` jobs gets one job budget. Jobs still running when
//! the batch deadline passes are recorded as `Timeout` and left to finish on
//! their own.

use fourpoint_core::data::{FailureKind, FetchError, FetchResult, RetryPolicy};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("worker pool width must be at least 1")]
    ZeroWorkers,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub per_call_timeout: Duration,
    /// Retry policy the jobs' sessions use; it sizes the deadline.
    pub retry: RetryPolicy,
    pub progress_every: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            per_call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            progress_every: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Worst case for one call: every attempt times out and every backoff
    /// is slept.
    pub fn call_budget(&self) -> Duration {
        self.per_call_timeout
            .saturating_mul(self.retry.max_retries.saturating_add(1))
            .saturating_add(self.retry.total_backoff())
    }

    /// Budget for one job making `requests` calls one after another.
    pub fn job_budget(&self, requests: u32) -> Duration {
        self.call_budget().saturating_mul(requests.max(1))
    }

    /// Budget for `jobs` jobs of `requests` calls each on this pool.
    pub fn batch_deadline(&self, jobs: usize, requests: u32) -> Duration {
        let waves = jobs.div_ceil(self.workers.max(1));
        u32::try_from(waves).map_or(Duration::MAX, |w| {
            self.job_budget(requests).saturating_mul(w)
        })
    }
}

// ─── Progress ────────────────────────────────────────────────────────

/// Observer for batch lifecycle events.
pub trait BatchProgress: Send + Sync {
    fn on_start(&self, batch: &str, total: usize);

    /// Called every `progress_every` completions.
    fn on_progress(&self, batch: &str, completed: usize, failed: usize, total: usize);

    fn on_batch_complete(&self, batch: &str, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl BatchProgress for TracingProgress {
    fn on_start(&self, batch: &str, total: usize) {
        info!(batch, total, "batch started");
    }

    fn on_progress(&self, batch: &str, completed: usize, failed: usize, total: usize) {
        info!(batch, completed, failed, total, "batch progress");
    }

    fn on_batch_complete(&self, batch: &str, succeeded: usize, failed: usize, total: usize) {
        if failed > 0 {
            warn!(batch, succeeded, failed, total, "batch finished with failures");
        } else {
            info!(batch, succeeded, total, "batch finished");
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn on_start(&self, _batch: &str, _total: usize) {}
    fn on_progress(&self, _batch: &str, _completed: usize, _failed: usize, _total: usize) {}
    fn on_batch_complete(&self, _batch: &str, _succeeded: usize, _failed: usize, _total: usize) {}
}

// ─── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure<K> {
    pub key: K,
    pub kind: FailureKind,
    pub message: String,
}

impl<K> JobFailure<K> {
    fn from_error(key: K, error: &FetchError) -> Self {
        Self {
            key,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything a batch produced, in submission order.
#[derive(Debug)]
pub struct BatchReport<K, T> {
    pub successes: Vec<(K, T)>,
    pub failures: Vec<JobFailure<K>>,
    pub elapsed: Duration,
}

impl<K, T> BatchReport<K, T> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    pub fn into_payloads(self) -> Vec<T> {
        self.successes.into_iter().map(|(_, v)| v).collect()
    }
}

/// Pending result of one submitted job.
#[derive(Debug)]
pub struct JobHandle<K, T> {
    key: K,
    rx: Receiver<FetchResult<T>>,
}

impl<K, T> JobHandle<K, T> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Block until the job finishes.
    pub fn wait(self) -> FetchResult<T> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(FetchError::Panicked("worker dropped the job".into())))
    }

    /// Block for at most `timeout`; an unfinished job is a `Timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> FetchResult<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(FetchError::Timeout(format!(
                "job not finished within {timeout:?}"
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(FetchError::Panicked("worker dropped the job".into()))
            }
        }
    }
}

// ─── Orchestrator ────────────────────────────────────────────────────

pub struct Orchestrator {
    pool: rayon::ThreadPool,
    config: OrchestratorConfig,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        if config.workers == 0 {
            return Err(OrchestratorError::ZeroWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("fourpoint-fetch-{i}"))
            .build()?;
        debug!(workers = config.workers, "worker pool ready");
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.workers
    }

    /// Queue one job; the handle yields its result.
    pub fn submit<K, T, F>(&self, key: K, job: F) -> JobHandle<K, T>
    where
        T: Send + 'static,
        F: FnOnce() -> FetchResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            // The handle may already be gone.
            let _ = tx.send(guarded(job));
        });
        JobHandle { key, rx }
    }

    /// Run `job` once per key and collect every outcome. Each job is
    /// budgeted for a single HTTP call.
    pub fn run_batch<K, T, F>(
        &self,
        batch: &str,
        keys: Vec<K>,
        job: F,
        progress: &dyn BatchProgress,
    ) -> BatchReport<K, T>
    where
        K: Clone + fmt::Display + Send + 'static,
        T: Send + 'static,
        F: Fn(&K) -> FetchResult<T> + Send + Sync + 'static,
    {
        self.run_batch_weighted(batch, keys, 1, job, progress)
    }

    /// [`run_batch`](Self::run_batch) for jobs that each make `requests`
    /// HTTP calls in sequence.
    pub fn run_batch_weighted<K, T, F>(
        &self,
        batch: &str,
        keys: Vec<K>,
        requests: u32,
        job: F,
        progress: &dyn BatchProgress,
    ) -> BatchReport<K, T>
    where
        K: Clone + fmt::Display + Send + 'static,
        T: Send + 'static,
        F: Fn(&K) -> FetchResult<T> + Send + Sync + 'static,
    {
        let total = keys.len();
        let started = Instant::now();
        let deadline = self.config.batch_deadline(total, requests);
        let every = self.config.progress_every.max(1);
        progress.on_start(batch, total);

        let job = Arc::new(job);
        let (tx, rx) = mpsc::channel();
        for (index, key) in keys.iter().cloned().enumerate() {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            self.pool.spawn(move || {
                let result = guarded(|| (*job)(&key));
                // After the deadline nobody is listening.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FetchResult<T>>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        let mut failed = 0;
        while completed < total {
            let remaining = deadline.saturating_sub(started.elapsed());
            match rx.recv_timeout(remaining) {
                Ok((index, result)) => {
                    if let Err(e) = &result {
                        failed += 1;
                        warn!(batch, key = %keys[index], error = %e, "job failed");
                    }
                    slots[index] = Some(result);
                    completed += 1;
                    if completed % every == 0 {
                        progress.on_progress(batch, completed, failed, total);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(batch, unfinished = total - completed, ?deadline, "batch deadline passed");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut successes = Vec::with_capacity(completed);
        let mut failures = Vec::new();
        for (key, slot) in keys.into_iter().zip(slots) {
            match slot {
                Some(Ok(value)) => successes.push((key, value)),
                Some(Err(e)) => failures.push(JobFailure::from_error(key, &e)),
                None => failures.push(JobFailure {
                    key,
                    kind: FailureKind::Timeout,
                    message: format!("not finished within the {deadline:?} batch deadline"),
                }),
            }
        }

        progress.on_batch_complete(batch, successes.len(), failures.len(), total);
        BatchReport {
            successes,
            failures,
            elapsed: started.elapsed(),
        }
    }
}

/// Run `job`, turning a panic into a `Panicked` error.
fn guarded<T>(job: impl FnOnce() -> FetchResult<T>) -> FetchResult<T> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(FetchError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
