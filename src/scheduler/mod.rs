//! Fixed-interval background task shared by the periodic subsystems.
//!
//! A scheduler owns at most one running loop. Each tick runs to completion
//! before the next one is awaited, so ticks never overlap; ticks that come
//! due while one is still running are skipped rather than queued. Each tick
//! runs as its own task, so a panicking tick is logged and the loop keeps
//! its cadence.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PollScheduler {
    name: String,
    running: Mutex<Option<RunningLoop>>,
}

impl PollScheduler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Spawn the tick loop. The first tick fires one `period` after start.
    ///
    /// Returns false (and leaves the current loop alone) if already running.
    pub fn start<F, Fut>(&self, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.lock_running();
        if running.is_some() {
            info!(scheduler = %self.name, "Scheduler already running, ignoring start");
            return false;
        }

        let period = if period.is_zero() {
            warn!(scheduler = %self.name, "Zero tick period, using 1s");
            Duration::from_secs(1)
        } else {
            period
        };

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let name = self.name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            // Skip missed ticks to prevent backlog when a tick overruns
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                debug!(scheduler = %name, "Tick");
                if let Err(e) = tokio::spawn(tick()).await {
                    error!(scheduler = %name, error = %e, "Tick failed, continuing");
                }
            }

            debug!(scheduler = %name, "Tick loop exited");
        });

        info!(
            scheduler = %self.name,
            period_ms = period.as_millis() as u64,
            "Scheduler started"
        );

        *running = Some(RunningLoop { cancel, handle });
        true
    }

    /// Stop the loop. An in-flight tick completes; no new tick starts.
    ///
    /// Returns false if the scheduler was not running.
    pub async fn stop(&self) -> bool {
        let current = self.lock_running().take();

        let Some(RunningLoop { cancel, handle }) = current else {
            info!(scheduler = %self.name, "Scheduler not running, ignoring stop");
            return false;
        };

        cancel.cancel();
        if let Err(e) = handle.await {
            warn!(scheduler = %self.name, error = %e, "Tick loop ended abnormally");
        }

        info!(scheduler = %self.name, "Scheduler stopped");
        true
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.lock_running().take() {
            running.cancel.cancel();
        }
    }
}
