//! Background health polling, one task per app.
//!
//! Each task probes its app, feeds the result to a `HealthTracker`, hands
//! the resulting status to the callback, and sleeps for the tracker's
//! delay. Tasks stop when their watch channel flips or the monitor is
//! told to stop everything.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Uri;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use loadgrid_core::{HealthSettings, HealthStatus};

use crate::checker::{HealthTracker, http_probe};

/// Future returned by a `HealthCallback`.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Receives `(app, status)` after every probe.
pub type HealthCallback = Arc<dyn Fn(String, HealthStatus) -> BoxFuture + Send + Sync>;

struct PollTask {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

impl PollTask {
    fn stop(self) {
        let _ = self.stop_tx.send(true);
        self.handle.abort();
    }
}

pub struct HealthMonitor {
    settings: HealthSettings,
    tasks: Mutex<HashMap<String, PollTask>>,
    callback: Option<HealthCallback>,
}

impl HealthMonitor {
    pub fn new(settings: HealthSettings) -> Self {
        Self {
            settings,
            tasks: Mutex::new(HashMap::new()),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: HealthCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Begin polling `app` at `base_url`, replacing an existing poller.
    pub async fn start_monitor(&self, app: &str, base_url: Uri) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let poller = Poller {
            app: app.to_string(),
            base_url,
            settings: self.settings.clone(),
            callback: self.callback.clone(),
        };
        let handle = tokio::spawn(poller.run(stop_rx));

        let previous = self
            .tasks
            .lock()
            .await
            .insert(app.to_string(), PollTask { handle, stop_tx });
        if let Some(previous) = previous {
            previous.stop();
            debug!(%app, "replaced existing health poller");
        }
        info!(%app, endpoint = %self.settings.endpoint, "health monitor started");
    }

    pub async fn stop_monitor(&self, app: &str) {
        if let Some(task) = self.tasks.lock().await.remove(app) {
            task.stop();
            info!(%app, "health monitor stopped");
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.tasks.lock().await.drain().collect();
        let count = drained.len();
        for (_, task) in drained {
            task.stop();
        }
        info!(stopped = count, "health monitors stopped");
    }

    /// Apps currently being polled.
    pub async fn active_monitors(&self) -> Vec<String> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    pub async fn is_monitoring(&self, app: &str) -> bool {
        self.tasks.lock().await.contains_key(app)
    }
}

/// Everything one polling task owns.
struct Poller {
    app: String,
    base_url: Uri,
    settings: HealthSettings,
    callback: Option<HealthCallback>,
}

impl Poller {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let timeout = self.settings.timeout();
        let mut tracker = HealthTracker::new(&self.settings);
        let app = self.app.as_str();

        loop {
            let report = http_probe(&self.base_url, &self.settings.endpoint, timeout).await;
            let before = tracker.status();
            let after = tracker.record(report.result);

            if after != before {
                if after == HealthStatus::Unhealthy {
                    warn!(
                        %app,
                        from = %before,
                        failures = tracker.consecutive_failures(),
                        error = report.error.as_deref().unwrap_or(""),
                        "app unhealthy"
                    );
                } else {
                    info!(%app, from = %before, to = %after, "app health changed");
                }
            }

            if let Some(callback) = &self.callback {
                callback(self.app.clone(), after).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(tracker.next_interval()) => {}
                _ = stop.changed() => break,
            }
        }
        debug!(%app, "health poller exited");
    }
}
