//! Bounded-concurrency dispatch of a batch of generation requests.
//!
//! Every request runs in its own tokio task. A single [`Semaphore`] shared by
//! all tasks caps the number of attempts in flight; a permit is held for the
//! duration of one attempt only and released before the retry delay, so a
//! request waiting to retry never blocks a fresh one.
//!
//! ## Retry Strategy
//!
//! Up to `max_attempts` attempts per request with a fixed delay in between.
//! Transport failures, timeouts, non-2xx statuses and malformed responses are
//! retried; a request that could not even be built is not. Once the budget
//! is spent the outcome is [`RequestError::Exhausted`] carrying the last
//! error.
//!
//! Outcomes come back in request order regardless of completion order.

use crate::batch::GenerationRequest;
use crate::config::GeneratorConfig;
use crate::error::RequestError;
use crate::output::GenerationOutcome;
use crate::pipeline::backend::ImageBackend;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Per-attempt timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Runs batches against one backend under one concurrency cap.
pub struct Dispatcher {
    backend: Arc<dyn ImageBackend>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    policy: RetryPolicy,
    progress: ProgressCallback,
}

impl Dispatcher {
    /// A dispatcher with the default retry policy and no progress reporting.
    ///
    /// `concurrency` is clamped to at least 1.
    pub fn new(backend: Arc<dyn ImageBackend>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            policy: RetryPolicy::default(),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn from_config(backend: Arc<dyn ImageBackend>, config: &GeneratorConfig) -> Self {
        let mut dispatcher = Self::new(backend, config.concurrency).with_policy(RetryPolicy {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        });
        if let Some(ref cb) = config.progress_callback {
            dispatcher = dispatcher.with_progress(Arc::clone(cb));
        }
        dispatcher
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run every request and return one outcome per request, in order.
    ///
    /// Never fails as a whole: per-request errors are folded into
    /// [`GenerationOutcome::Failure`].
    pub async fn dispatch(&self, requests: &[GenerationRequest]) -> Vec<GenerationOutcome> {
        let total = requests.len();
        if total == 0 {
            return Vec::new();
        }

        let start = Instant::now();
        info!(
            "Dispatching {} request(s) via {} (max {} concurrent)",
            total,
            self.backend.name(),
            self.concurrency
        );
        self.progress.on_batch_start(total);

        let completed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = requests
            .iter()
            .enumerate()
            .map(|(position, request)| {
                let task = RequestTask {
                    position,
                    total,
                    request: request.clone(),
                    backend: Arc::clone(&self.backend),
                    semaphore: Arc::clone(&self.semaphore),
                    policy: self.policy,
                    progress: Arc::clone(&self.progress),
                    completed: Arc::clone(&completed),
                };
                tokio::spawn(task.run())
            })
            .collect();

        let outcomes: Vec<GenerationOutcome> = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(position, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The task died before reporting; settle it here.
                    let err = RequestError::Build(format!("request task aborted: {e}"));
                    warn!("Request {}: {}", position + 1, err);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.progress
                        .on_request_error(position, done, total, err.to_string());
                    GenerationOutcome::Failure(err)
                }
            })
            .collect();

        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        self.progress.on_batch_complete(total, success_count);
        info!(
            "Batch settled: {}/{} succeeded in {:?}",
            success_count,
            total,
            start.elapsed()
        );

        outcomes
    }
}

/// Everything one spawned request needs, owned so the task is `'static`.
struct RequestTask {
    position: usize,
    total: usize,
    request: GenerationRequest,
    backend: Arc<dyn ImageBackend>,
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
    progress: ProgressCallback,
    completed: Arc<AtomicUsize>,
}

impl RequestTask {
    async fn run(self) -> GenerationOutcome {
        let result = self.attempt_until_settled().await;

        // Counted exactly once per request, after its final attempt.
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        match &result {
            Ok(bytes) => {
                self.progress
                    .on_request_complete(self.position, completed, self.total, bytes.len())
            }
            Err(e) => {
                self.progress
                    .on_request_error(self.position, completed, self.total, e.to_string())
            }
        }

        result.into()
    }

    async fn attempt_until_settled(&self) -> Result<Vec<u8>, RequestError> {
        let mut attempt: u32 = 1;
        loop {
            let err = match self.attempt().await {
                Ok(bytes) => {
                    debug!(
                        "Request {}: {} bytes on attempt {}",
                        self.position + 1,
                        bytes.len(),
                        attempt
                    );
                    return Ok(bytes);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!("Request {}: not retrying: {}", self.position + 1, err);
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                warn!(
                    "Request {}: giving up after {} attempt(s): {}",
                    self.position + 1,
                    attempt,
                    err
                );
                return Err(RequestError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!(
                "Request {}: attempt {}/{} failed: {}; retrying in {}ms",
                self.position + 1,
                attempt,
                self.policy.max_attempts,
                err,
                self.policy.retry_delay.as_millis()
            );
            self.progress
                .on_request_retry(self.position, attempt, err.to_string());
            sleep(self.policy.retry_delay).await;
            attempt += 1;
        }
    }

    /// One attempt under a concurrency permit.
    async fn attempt(&self) -> Result<Vec<u8>, RequestError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| RequestError::Build("concurrency limiter closed".into()))?;

        match timeout(self.policy.timeout, self.backend.generate(&self.request)).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout {
                secs: self.policy.timeout.as_secs(),
            }),
        }
    }
}
