//! Sweeper — background task that keeps idle connections warm.
//!
//! One task per registry. Every `sweep_interval` it runs
//! `Registry::sweep_once`, which pings idle connections of ping-enabled
//! pools. The sweeper never takes a slot out of circulation and never acts
//! on a failed ping beyond logging it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::driver::Connection;
use crate::registry::Registry;

/// Shortest interval the sweeper accepts; shorter requests are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running sweeper task.
///
/// Call `shutdown` for an orderly stop. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct Sweeper {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    interval: Duration,
}

impl Sweeper {
    /// Start sweeping `registry` at its configured `sweep_interval`.
    ///
    /// Must be called from within a tokio runtime. The first pass runs one
    /// full interval after start.
    pub fn start<C: Connection>(registry: Arc<Registry<C>>) -> Self {
        let interval = registry.settings().sweep_interval;
        Self::start_with_interval(registry, interval)
    }

    /// Start sweeping every `interval`, raised to `MIN_SWEEP_INTERVAL` if shorter.
    pub fn start_with_interval<C: Connection>(registry: Arc<Registry<C>>, interval: Duration) -> Self {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sweep_loop(registry, interval, shutdown_rx));
        info!(?interval, "sweeper started");
        Self {
            handle: Some(handle),
            shutdown_tx,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run_sweep_loop<C: Connection>(
    registry: Arc<Registry<C>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let report = registry.sweep_once().await;
                if report.failed > 0 {
                    debug!(failed = report.failed, pinged = report.pinged, "sweep saw failed pings");
                }
            }
            _ = shutdown.changed() => {
                debug!("sweep loop shutting down");
                break;
            }
        }
    }
}
