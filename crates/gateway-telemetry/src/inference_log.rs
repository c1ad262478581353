//! Asynchronous inference log.
//!
//! [`TelemetryLogger::record`] pushes onto a bounded channel and returns
//! immediately. A single background task drains the channel and appends each
//! entry to the store. Nothing on this path can fail or slow a request:
//! - a full or closed channel drops the entry
//! - a store error drops the entry
//!
//! Either case is a telemetry write error, reported on the side channel
//! (an `error` log with target `telemetry_side_channel` plus a counter).

use crate::metrics::Metrics;
use gateway_core::inference_log::INFERENCE_LOG_KEY;
use gateway_core::{
    AttemptRecorder, GatewayError, InferenceLogEntry, KeyValueStore, StoreResult,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

enum Command {
    Write(Box<InferenceLogEntry>),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct SideChannel {
    failures: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl SideChannel {
    fn report(&self, err: &GatewayError, entry: &InferenceLogEntry) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_telemetry_failure();
        }
        error!(
            target: "telemetry_side_channel",
            request_id = %entry.request_id,
            provider = %entry.provider_id,
            attempt = entry.attempt,
            error = %err,
            "Inference log entry dropped"
        );
    }
}

/// Non-blocking writer of per-attempt log entries
#[derive(Debug, Clone)]
pub struct TelemetryLogger {
    tx: mpsc::Sender<Command>,
    side_channel: Arc<SideChannel>,
}

impl TelemetryLogger {
    /// Start the background writer.
    ///
    /// The writer stops once every logger clone is dropped and the queue is
    /// drained.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        capacity: usize,
        metrics: Option<Arc<Metrics>>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let side_channel = Arc::new(SideChannel {
            failures: AtomicU64::new(0),
            metrics,
        });

        let handle = tokio::spawn(write_loop(rx, store, Arc::clone(&side_channel)));
        (Self { tx, side_channel }, handle)
    }

    /// Wait until every entry queued before this call has been written
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Entries dropped so far
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.side_channel.failures.load(Ordering::Relaxed)
    }
}

impl AttemptRecorder for TelemetryLogger {
    fn record(&self, entry: InferenceLogEntry) {
        if let Err(err) = self.tx.try_send(Command::Write(Box::new(entry))) {
            let (reason, command) = match err {
                mpsc::error::TrySendError::Full(command) => ("inference log queue full", command),
                mpsc::error::TrySendError::Closed(command) => ("inference log writer stopped", command),
            };
            if let Command::Write(entry) = command {
                self.side_channel
                    .report(&GatewayError::telemetry_write(reason), &entry);
            }
        }
    }
}

async fn write_loop(
    mut rx: mpsc::Receiver<Command>,
    store: Arc<dyn KeyValueStore>,
    side_channel: Arc<SideChannel>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(entry) => {
                let result = match serde_json::to_vec(entry.as_ref()) {
                    Ok(bytes) => store
                        .append(INFERENCE_LOG_KEY, bytes)
                        .await
                        .map_err(|e| GatewayError::telemetry_write(e.to_string())),
                    Err(e) => Err(GatewayError::telemetry_write(e.to_string())),
                };
                if let Err(err) = result {
                    side_channel.report(&err, &entry);
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Inference log writer stopped");
}

/// Read back the inference log, oldest first
///
/// # Errors
/// Returns error if the store read or decoding fails
pub async fn load_entries(store: &dyn KeyValueStore) -> StoreResult<Vec<InferenceLogEntry>> {
    store
        .list(INFERENCE_LOG_KEY)
        .await?
        .iter()
        .map(|bytes| serde_json::from_slice(bytes).map_err(Into::into))
        .collect()
}
