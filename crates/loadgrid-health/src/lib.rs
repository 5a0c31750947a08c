//! loadgrid-health — health checking for registered worker apps.
//!
//! Provides HTTP health probes, a per-app status tracker with exponential
//! backoff, and a monitor that runs one background polling task per app.
//! Status is advisory: it colors the dashboard and nothing else.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── Per-app background task
//!   │   ├── HealthTracker (consecutive failures, backoff)
//!   │   ├── http_probe() → ProbeReport
//!   │   └── HealthCallback(app, status) after every probe
//!   └── watch channel per task for shutdown
//! ```
//!
//! # State machine
//!
//! `Unknown → Healthy` on the first successful probe, `Healthy ⇄ Unhealthy`
//! once `unhealthy_threshold` consecutive probes fail. There is no terminal
//! state; apps are polled for the lifetime of the process.

pub mod checker;
pub mod monitor;

pub use checker::{HealthTracker, ProbeReport, ProbeResult, http_probe};
pub use monitor::{BoxFuture, HealthCallback, HealthMonitor};
