//! Simulated autoscaling: how many instances a load level "needs".

/// Instance count for the busiest resource level.
///
/// The 0–100 range is split into `max_instances` equal steps; each step
/// adds one instance, capped at `max_instances`. With the default of 4:
/// 0–24 → 1, 25–49 → 2, 50–74 → 3, 75–100 → 4.
pub fn instance_count_for(max_level: u8, max_instances: u32) -> u32 {
    if max_instances <= 1 {
        return 1;
    }
    let step = (100 / max_instances).max(1);
    (1 + max_level as u32 / step).min(max_instances)
}
