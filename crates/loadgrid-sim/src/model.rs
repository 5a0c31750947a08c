//! Resource model — one per worker process.
//!
//! Levels and the fabricated throughput counters sit behind a single
//! mutex that is only ever held for in-memory computation. Request and
//! error counters are atomics so the HTTP layer can bump them without
//! touching the lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tracing::debug;

use loadgrid_core::config::DEFAULT_MAX_INSTANCES;
use loadgrid_core::{LevelSet, LevelUpdate, MetricSnapshot, MetricSource, ResourceKind, WorkerConfig};

use crate::scaling::instance_count_for;

/// Largest distance between a reading and its level.
pub const JITTER_MAX: f64 = 5.0;

/// Memory reported at 100% storage (MB per percent).
const MEMORY_MB_PER_PERCENT: f64 = 3.52;

/// Orders "processed" per metrics read, per level point.
const ORDERS_PER_LEVEL: u64 = 10;

/// Completions "recorded" per metrics read, per level point.
const COMPLETIONS_PER_LEVEL: u64 = 5;

/// Knobs that shape the fabricated metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Instance count reported at full load.
    pub max_instances: u32,
    /// Instance count reported by the hosting platform; overrides the
    /// step function and marks snapshots as `hybrid`.
    pub platform_instance_count: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            platform_instance_count: None,
        }
    }
}

impl From<&WorkerConfig> for ModelSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_instances: config.max_instances,
            platform_instance_count: config.platform_instance_count,
        }
    }
}

/// State guarded by the model lock.
#[derive(Debug, Default)]
struct ModelState {
    levels: LevelSet,
    orders_processed: u64,
    completions_recorded: u64,
}

/// Slider levels plus the synthetic metrics derived from them.
#[derive(Debug)]
pub struct ResourceModel {
    app_name: String,
    settings: ModelSettings,
    state: Mutex<ModelState>,
    request_count: AtomicU64,
    error_count: AtomicU64,
}

impl ResourceModel {
    /// A fresh model with every level at 0.
    pub fn new(app_name: impl Into<String>, settings: ModelSettings) -> Self {
        Self {
            app_name: app_name.into(),
            settings,
            state: Mutex::new(ModelState::default()),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    // Poisoning is ignored: every write under the lock is a single assignment.
    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `clamp(value, 0, 100)` for one resource and return it.
    pub fn set_level(&self, kind: ResourceKind, value: i64) -> u8 {
        let stored = self.lock().levels.set(kind, value);
        debug!(app = %self.app_name, resource = %kind, requested = value, stored, "level set");
        stored
    }

    /// Replace every level with the update's; kinds it leaves out become 0.
    /// Returns the stored set.
    pub fn replace(&self, update: &LevelUpdate) -> LevelSet {
        let mut state = self.lock();
        state.levels = LevelSet::from(update);
        debug!(
            app = %self.app_name,
            entries = update.len(),
            running = state.levels.any_active(),
            "levels updated"
        );
        state.levels.clone()
    }

    /// Every level back to 0.
    pub fn reset(&self) -> LevelSet {
        let mut state = self.lock();
        state.levels = LevelSet::default();
        debug!(app = %self.app_name, "levels reset");
        state.levels.clone()
    }

    pub fn levels(&self) -> LevelSet {
        self.lock().levels.clone()
    }

    /// True iff any level is above zero.
    pub fn is_running(&self) -> bool {
        self.lock().levels.any_active()
    }

    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Zero the request and error counters. Levels and throughput totals stay.
    pub fn reset_counters(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        debug!(app = %self.app_name, "request counters reset");
    }

    /// Snapshot with fresh jitter from the thread-local RNG.
    pub fn read_metrics(&self) -> MetricSnapshot {
        self.read_metrics_with(&mut rand::thread_rng())
    }

    /// Snapshot using the given RNG for jitter.
    pub fn read_metrics_with<R: Rng + ?Sized>(&self, rng: &mut R) -> MetricSnapshot {
        let mut state = self.lock();
        let levels = state.levels.clone();
        let is_running = levels.any_active();

        let readings: BTreeMap<ResourceKind, f64> = levels
            .iter()
            .map(|(kind, level)| {
                // Idle workers report flat zeros; jitter only applies while running.
                let reading = if is_running { jittered(level, &mut *rng) } else { 0.0 };
                (kind, reading)
            })
            .collect();

        if is_running {
            state.orders_processed += levels.get(ResourceKind::Orders) as u64 * ORDERS_PER_LEVEL;
            state.completions_recorded +=
                levels.get(ResourceKind::Completions) as u64 * COMPLETIONS_PER_LEVEL;
        }
        let orders_processed = state.orders_processed;
        let completions_recorded = state.completions_recorded;
        drop(state);

        let (instance_count, source) = match self.settings.platform_instance_count {
            Some(count) => (count, MetricSource::Hybrid),
            None if is_running => (
                instance_count_for(levels.max_level(), self.settings.max_instances),
                MetricSource::Simulation,
            ),
            None => (1, MetricSource::Simulation),
        };

        let request_count = self.request_count();
        let error_count = self.error_count();
        let success_rate = request_count.saturating_sub(error_count) as f64
            / request_count.max(1) as f64
            * 100.0;

        let cpu_percent = readings.get(&ResourceKind::Processing).copied().unwrap_or(0.0);
        let memory_percent = readings.get(&ResourceKind::Storage).copied().unwrap_or(0.0);

        MetricSnapshot {
            app_name: self.app_name.clone(),
            cpu_percent,
            memory_percent,
            memory_used_mb: (memory_percent * MEMORY_MB_PER_PERCENT) as u64,
            instance_count,
            is_running,
            source,
            levels,
            readings,
            request_count,
            error_count,
            success_rate,
            orders_processed,
            completions_recorded,
        }
    }
}

/// `clamp(level + jitter, 0, 100)` rounded to one decimal.
fn jittered<R: Rng + ?Sized>(level: u8, rng: &mut R) -> f64 {
    let raw = level as f64 + rng.gen_range(-JITTER_MAX..=JITTER_MAX);
    let rounded = (raw * 10.0).round() / 10.0;
    rounded.clamp(0.0, 100.0)
}
