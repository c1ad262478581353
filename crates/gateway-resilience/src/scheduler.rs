//! Timer abstraction for failover backoff.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Waits between failover attempts
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Wait for `delay`.
    ///
    /// Returns `false` if `cancel` fired before the delay elapsed.
    async fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> bool;
}

/// Production scheduler backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

/// Scheduler that records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        self.delays.lock().push(delay);
        !cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_sleeps() {
        let started = tokio::time::Instant::now();
        assert!(TokioScheduler.sleep(Duration::from_secs(3), &CancellationToken::new()).await);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!TokioScheduler.sleep(Duration::from_secs(3600), &cancel).await);
    }

    #[tokio::test]
    async fn test_recording_scheduler() {
        let scheduler = RecordingScheduler::new();
        let cancel = CancellationToken::new();
        assert!(scheduler.sleep(Duration::from_millis(10), &cancel).await);
        assert!(scheduler.sleep(Duration::from_millis(20), &cancel).await);
        assert_eq!(
            scheduler.delays(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }
}
