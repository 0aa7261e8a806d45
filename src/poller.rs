//! Fixed-period background refresh of live-feed telemetry.
//!
//! One task per mounted live view. The first fetch fires immediately, then
//! one per period. Ticks are serialized: the fetch is awaited inside the tick
//! loop and missed ticks are delayed, so a fetch slower than the period can
//! never overlap the next one. Teardown is deterministic — after
//! `shutdown()` (or drop) no tick fires and a fetch already in flight is
//! abandoned without publishing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::DashboardApi;
use crate::model::TelemetrySample;

/// The dashboard refreshes live statistics once a second.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

pub struct TelemetryPoller {
    latest: watch::Receiver<Option<TelemetrySample>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TelemetryPoller {
    /// Starts the polling task. The held sample starts empty and is replaced
    /// wholesale on every successful fetch; a failed fetch logs and keeps the
    /// previous sample, with no backoff and no error surfaced.
    pub fn spawn(api: Arc<dyn DashboardApi>, period: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {}
                }

                let fetched = tokio::select! {
                    _ = token.cancelled() => break,
                    result = api.stats() => result,
                };

                match fetched {
                    Ok(sample) => {
                        let _ = tx.send(Some(sample));
                    }
                    Err(err) => {
                        warn!(error = %err, "telemetry fetch failed, keeping previous sample");
                    }
                }
            }
            debug!("telemetry poller stopped");
        });

        Self { latest: rx, cancel, task: Some(task) }
    }

    /// The most recent successfully fetched sample, if any yet.
    pub fn latest(&self) -> Option<TelemetrySample> {
        self.latest.borrow().clone()
    }

    /// A receiver that observes every replacement of the held sample.
    pub fn subscribe(&self) -> watch::Receiver<Option<TelemetrySample>> {
        self.latest.clone()
    }

    /// Cancels the task. Idempotent; no tick fires afterwards.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Cancels and waits for the task to finish.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
