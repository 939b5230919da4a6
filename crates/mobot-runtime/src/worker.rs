//! [`Worker`] – a named periodic background task with an explicit stop.
//!
//! The interlock and the mode controller each run as a worker: a tokio task
//! that calls a synchronous step once per period until told to stop.  A step
//! that panics is logged and the loop carries on with the next period; every
//! completed period heartbeats the shared [`Watchdog`].
//!
//! Steps run inline on the runtime.  They must return promptly; sensor and
//! actuator calls in this crate are short by contract.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use mobot_kernel::Watchdog;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Minimum heartbeat deadline, so short periods do not flag scheduling jitter.
const MIN_DEADLINE: Duration = Duration::from_secs(1);

pub struct Worker {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    watchdog: Arc<Watchdog>,
}

impl Worker {
    /// Spawn `step` on `runtime`, called every `period` (the first call is
    /// immediate).  The worker is registered with `watchdog` under `name`
    /// with a deadline of ten periods.
    pub fn spawn<F>(
        runtime: &Handle,
        name: impl Into<String>,
        period: Duration,
        watchdog: Arc<Watchdog>,
        mut step: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        watchdog.register(&name, (period * 10).max(MIN_DEADLINE));

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task_name = name.clone();
        let task_watchdog = watchdog.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(worker = %task_name, period_ms = period.as_millis() as u64, "worker started");
            loop {
                tokio::select! {
                    biased;
                    // A dropped sender also ends the loop.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        if catch_unwind(AssertUnwindSafe(&mut step)).is_err() {
                            error!(worker = %task_name, "worker step panicked");
                        }
                        task_watchdog.heartbeat(&task_name);
                    }
                }
            }
            debug!(worker = %task_name, "worker loop exited");
        });

        Self {
            name,
            stop_tx,
            handle,
            watchdog,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait for the current step to finish.
    pub async fn stop(self) {
        // The receiver is gone only if the task already ended.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(worker = %self.name, error = %e, "worker task failed");
        }
        self.watchdog.unregister(&self.name);
        info!(worker = %self.name, "worker stopped");
    }
}
