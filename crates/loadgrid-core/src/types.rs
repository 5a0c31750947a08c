//! Domain types for the loadgrid wire contract.
//!
//! Everything here is plain data: serializable, cheap to clone, and free
//! of locks. The resource model and the gateway registry wrap these in
//! whatever synchronization they need.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoadgridError, LoadgridResult};

/// Lowest slider level.
pub const LEVEL_MIN: u8 = 0;

/// Highest slider level.
pub const LEVEL_MAX: u8 = 100;

/// Clamp an arbitrary integer into `[LEVEL_MIN, LEVEL_MAX]`.
pub fn clamp_level(value: i64) -> u8 {
    value.clamp(LEVEL_MIN as i64, LEVEL_MAX as i64) as u8
}

// ── Resources ──────────────────────────────────────────────────────

/// One simulated load dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// CPU-style load.
    Processing,
    /// Memory-style load.
    Storage,
    /// Network-style load.
    Traffic,
    /// Business process simulation.
    Orders,
    /// Work completion simulation.
    Completions,
}

impl ResourceKind {
    /// Every kind, in wire order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Processing,
        ResourceKind::Storage,
        ResourceKind::Traffic,
        ResourceKind::Orders,
        ResourceKind::Completions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Processing => "processing",
            ResourceKind::Storage => "storage",
            ResourceKind::Traffic => "traffic",
            ResourceKind::Orders => "orders",
            ResourceKind::Completions => "completions",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = LoadgridError;

    fn from_str(s: &str) -> LoadgridResult<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| LoadgridError::Validation(format!("unknown resource: {s}")))
    }
}

// ── Levels ─────────────────────────────────────────────────────────

/// Full set of levels: every `ResourceKind` is always present.
///
/// Values are clamped on the way in, including when deserializing a
/// worker's response, so a `LevelSet` never holds a value above 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<ResourceKind, u8>",
    into = "BTreeMap<ResourceKind, u8>"
)]
pub struct LevelSet {
    levels: BTreeMap<ResourceKind, u8>,
}

impl LevelSet {
    /// All levels at the same value (clamped).
    pub fn uniform(value: u8) -> Self {
        let value = value.min(LEVEL_MAX);
        Self {
            levels: ResourceKind::ALL.into_iter().map(|k| (k, value)).collect(),
        }
    }

    /// Level for one resource.
    pub fn get(&self, kind: ResourceKind) -> u8 {
        self.levels.get(&kind).copied().unwrap_or(LEVEL_MIN)
    }

    /// Store `clamp(value, 0, 100)` and return what was stored.
    pub fn set(&mut self, kind: ResourceKind, value: i64) -> u8 {
        let level = clamp_level(value);
        self.levels.insert(kind, level);
        level
    }

    /// Highest level across all resources.
    pub fn max_level(&self) -> u8 {
        self.levels.values().copied().max().unwrap_or(LEVEL_MIN)
    }

    /// True iff any level is above zero.
    pub fn any_active(&self) -> bool {
        self.levels.values().any(|&v| v > 0)
    }

    /// Iterate `(kind, level)` in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u8)> + '_ {
        self.levels.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for LevelSet {
    fn default() -> Self {
        Self::uniform(LEVEL_MIN)
    }
}

impl From<BTreeMap<ResourceKind, u8>> for LevelSet {
    fn from(partial: BTreeMap<ResourceKind, u8>) -> Self {
        let mut set = LevelSet::default();
        for (kind, value) in partial {
            set.set(kind, value as i64);
        }
        set
    }
}

/// Kinds the update leaves out are 0.
impl From<&LevelUpdate> for LevelSet {
    fn from(update: &LevelUpdate) -> Self {
        let mut set = LevelSet::default();
        for (kind, value) in update.iter() {
            set.set(kind, value as i64);
        }
        set
    }
}

impl From<LevelSet> for BTreeMap<ResourceKind, u8> {
    fn from(set: LevelSet) -> Self {
        set.levels
    }
}

/// A validated, possibly partial, level update.
///
/// Built from untrusted JSON: the payload must be an object whose keys are
/// known resource names and whose values are integers. Out-of-range
/// integers are clamped rather than rejected. Stored as a whole
/// `LevelSet`, so kinds left out become 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LevelUpdate {
    levels: BTreeMap<ResourceKind, u8>,
}

impl LevelUpdate {
    /// Update from already-typed pairs (values are clamped).
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ResourceKind, i64)>) -> Self {
        Self {
            levels: pairs.into_iter().map(|(k, v)| (k, clamp_level(v))).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u8)> + '_ {
        self.levels.iter().map(|(k, v)| (*k, *v))
    }
}

impl From<&LevelSet> for LevelUpdate {
    fn from(set: &LevelSet) -> Self {
        Self {
            levels: set.levels.clone(),
        }
    }
}

impl TryFrom<serde_json::Value> for LevelUpdate {
    type Error = LoadgridError;

    fn try_from(value: serde_json::Value) -> LoadgridResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(LoadgridError::Validation(
                "levels must be an object of resource name to integer".to_string(),
            ));
        };

        let mut levels = BTreeMap::new();
        for (name, raw) in map {
            let kind: ResourceKind = name.parse()?;
            let level = match (raw.as_i64(), raw.as_u64()) {
                (Some(v), _) => clamp_level(v),
                (None, Some(_)) => LEVEL_MAX,
                _ => {
                    return Err(LoadgridError::Validation(format!(
                        "level for {kind} must be an integer, got {raw}"
                    )));
                }
            };
            levels.insert(kind, level);
        }
        Ok(Self { levels })
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// Where a snapshot's instance count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    /// Everything derived from slider levels.
    Simulation,
    /// Simulated percentages with a platform-reported instance count.
    Hybrid,
}

/// Read-only view of a worker's simulated load, recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub app_name: String,
    /// Jittered `processing` reading.
    pub cpu_percent: f64,
    /// Jittered `storage` reading.
    pub memory_percent: f64,
    pub memory_used_mb: u64,
    pub instance_count: u32,
    pub is_running: bool,
    pub source: MetricSource,
    /// Levels the readings were derived from.
    pub levels: LevelSet,
    /// One jittered percent per resource.
    pub readings: BTreeMap<ResourceKind, f64>,
    pub request_count: u64,
    pub error_count: u64,
    /// `(requests - errors) / max(requests, 1)` as a percent.
    pub success_rate: f64,
    pub orders_processed: u64,
    pub completions_recorded: u64,
}

// ── Health ─────────────────────────────────────────────────────────

/// Health status as determined by health probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        })
    }
}

// ── Worker responses ───────────────────────────────────────────────

/// Body of a worker's `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub app_name: String,
    pub uptime_secs: u64,
}

/// Body of a worker's `POST /resources` and `POST /resources/reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelsResponse {
    pub status: String,
    pub app_name: String,
    pub levels: LevelSet,
}
