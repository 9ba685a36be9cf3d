//! Progress-callback trait for per-request generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events while the dispatcher works through a batch. The CLI forwards them
//! to an indicatif progress bar; tests count them.
//!
//! # Example
//!
//! ```rust
//! use slidegen::{GenerationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_request_complete(&self, position: usize, completed: usize, total: usize, bytes: usize) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("request {position} done ({bytes} bytes), {completed}/{total}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//! let config = GeneratorConfig::builder()
//!     .api_key("k")
//!     .model("m")
//!     .progress_callback(cb as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the dispatcher as requests settle.
///
/// Requests run concurrently, so methods may be called from interleaved
/// tasks in any order. Implementations protect shared state with atomics or
/// a `Mutex`. All methods default to no-ops.
///
/// `position` is the request's 0-based index in the batch. `completed` is
/// the value of the batch's shared progress counter after this request was
/// counted, so it rises by exactly one per request regardless of retries.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before any request is sent.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when an attempt failed and another one is scheduled.
    ///
    /// Not a progress step: the counter does not move.
    fn on_request_retry(&self, position: usize, attempt: u32, error: String) {
        let _ = (position, attempt, error);
    }

    /// Called once when a request produced an image.
    fn on_request_complete(&self, position: usize, completed: usize, total: usize, bytes: usize) {
        let _ = (position, completed, total, bytes);
    }

    /// Called once when a request failed after exhausting its attempts.
    fn on_request_error(&self, position: usize, completed: usize, total: usize, error: String) {
        let _ = (position, completed, total, error);
    }

    /// Called once after every request has settled.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        completes: AtomicUsize,
        errors: AtomicUsize,
        retries: AtomicUsize,
        success_total: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_request_retry(&self, _position: usize, _attempt: u32, _error: String) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request_complete(&self, _p: usize, _c: usize, _t: usize, _bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request_error(&self, _p: usize, _c: usize, _t: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.success_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(4);
        cb.on_request_retry(0, 1, "timeout".into());
        cb.on_request_complete(0, 1, 4, 1024);
        cb.on_request_error(1, 2, 4, "HTTP 500".into());
        cb.on_batch_complete(4, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_request_retry(2, 1, "HTTP 503".into());
        tracker.on_request_complete(0, 1, 3, 10);
        tracker.on_request_complete(2, 2, 3, 10);
        tracker.on_request_error(1, 3, 3, "No images in response".into());
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.success_total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn arc_dyn_callback_moves_into_spawned_task() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        tokio::spawn(async move {
            cb.on_request_error(0, 1, 1, "timed out".to_string());
        })
        .await
        .expect("spawn must succeed");
    }
}
