use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatcher::{CycleReport, Dispatcher};

/// Result of one scheduler firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    Completed(CycleReport),
    /// Another cycle held the execution token.
    Skipped,
    Failed,
}

/// Fires review cycles on a fixed interval. At most one cycle runs at a time.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    cycle_token: Arc<Mutex<()>>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            cycle_token: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// The first cycle fires one interval after start.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            warn!("Scheduler already started");
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Starting scheduler");
        *handle = Some(tokio::spawn(run_loop(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.cycle_token),
            self.interval,
            self.shutdown.clone(),
        )));
    }

    /// Runs a cycle now unless one is already in progress or the scheduler
    /// has been stopped.
    pub async fn trigger(&self) -> Firing {
        fire(&self.dispatcher, &self.cycle_token, &self.shutdown).await
    }

    /// Stops future firings and waits for an in-flight cycle to finish,
    /// including one started through [`Scheduler::trigger`].
    pub async fn stop(&self) {
        info!("Stopping scheduler");
        self.shutdown.cancel();

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler loop terminated abnormally");
            }
        }

        // A manual trigger may still hold the token.
        let _token = self.cycle_token.lock().await;
        info!("Scheduler stopped");
    }
}

async fn run_loop(
    dispatcher: Arc<Dispatcher>,
    cycle_token: Arc<Mutex<()>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                fire(&dispatcher, &cycle_token, &shutdown).await;
            }
        }
    }
}

async fn fire(
    dispatcher: &Dispatcher,
    cycle_token: &Mutex<()>,
    shutdown: &CancellationToken,
) -> Firing {
    let Ok(_token) = cycle_token.try_lock() else {
        warn!("Previous review cycle still running, skipping this firing");
        return Firing::Skipped;
    };
    // Checked under the token so `stop` never returns before a late firing.
    if shutdown.is_cancelled() {
        info!("Scheduler stopped, skipping this firing");
        return Firing::Skipped;
    }

    info!("Running scheduled code review cycle");
    match dispatcher.run_cycle().await {
        Ok(report) => Firing::Completed(report),
        Err(e) => {
            error!(error = %e, "Failed to process pending submissions");
            Firing::Failed
        }
    }
}
