//! loadgrid-sim — the per-worker resource model.
//!
//! Turns slider levels into plausible-looking metrics. Nothing is
//! measured: every percentage is the level plus a small random jitter,
//! and the instance count is a step function of the busiest resource,
//! so the dashboard shows "autoscaling" without anything scaling.
//!
//! # Architecture
//!
//! ```text
//! ResourceModel
//!   ├── Mutex<ModelState>   levels + fabricated throughput counters
//!   ├── AtomicU64 counters  requests / errors
//!   └── read_metrics()      → MetricSnapshot (jitter re-rolled per call)
//!
//! scaling
//!   └── instance_count_for(max_level, max_instances)
//! ```

pub mod model;
pub mod scaling;

pub use model::{JITTER_MAX, ModelSettings, ResourceModel};
pub use scaling::instance_count_for;
