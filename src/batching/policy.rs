/// Central configuration for batching and dispatch behavior.
///
/// All tunables live here so behavior can be adjusted without touching the
/// algorithm modules. Policies are immutable; swap by constructing a new
/// one and replacing the shared reference at a cycle boundary.
#[derive(Debug, Clone)]
pub struct BatchingPolicy {
    /// Upper bound on orders per job.
    pub max_batch_size: usize,

    /// Max `t_batch / sum(t_single)` for two-order jobs.
    pub pair_detour_cap: f64,

    /// Same cap for jobs of three or more orders.
    pub multi_detour_cap: f64,

    /// Chain across merchants: clustering returns one global pool instead
    /// of per-pickup groups. The insertion loop still rejects combinations
    /// that violate the detour caps.
    pub enable_continuous_chaining: bool,

    /// Defer lone orders instead of emitting them as singles right away.
    pub enable_rolling_horizon: bool,

    /// Age at which a deferred order is forced into a single job.
    pub max_wait_time_seconds: f64,

    /// Cap on orders considered per cluster (oldest kept); the rest stay
    /// in the pool for the next cycle.
    pub max_cluster_candidates: usize,

    /// Drivers per offer wave.
    pub wave_size: usize,

    /// Offer waves per job.
    pub wave_count: usize,

    /// Delay between successive waves.
    pub wave_interval_ms: u64,

    /// Total time a job may stay live before it is abandoned.
    pub acceptance_deadline_ms: u64,
}

impl BatchingPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size < 1 {
            return Err("max_batch_size must be >= 1".to_string());
        }
        if self.pair_detour_cap < 1.0 {
            return Err("pair_detour_cap must be >= 1.0".to_string());
        }
        if self.multi_detour_cap < 1.0 {
            return Err("multi_detour_cap must be >= 1.0".to_string());
        }
        if self.max_wait_time_seconds < 0.0 {
            return Err("max_wait_time_seconds must be >= 0".to_string());
        }
        if self.max_cluster_candidates < 1 {
            return Err("max_cluster_candidates must be >= 1".to_string());
        }
        if self.wave_size < 1 {
            return Err("wave_size must be >= 1".to_string());
        }
        if self.wave_count < 1 {
            return Err("wave_count must be >= 1".to_string());
        }
        Ok(())
    }
}

pub fn default_policy() -> BatchingPolicy {
    BatchingPolicy {
        max_batch_size: 10,
        pair_detour_cap: 1.15,
        multi_detour_cap: 1.25,
        enable_continuous_chaining: true,
        enable_rolling_horizon: true,
        max_wait_time_seconds: 180.0,
        max_cluster_candidates: 20,
        wave_size: 5,
        wave_count: 5,
        wave_interval_ms: 15_000,
        acceptance_deadline_ms: 90_000,
    }
}

/// More aggressive batching for lunch/dinner/weekend peaks.
pub fn peak_policy() -> BatchingPolicy {
    BatchingPolicy {
        pair_detour_cap: 1.18,
        multi_detour_cap: 1.35,
        max_wait_time_seconds: 240.0,
        ..default_policy()
    }
}

/// Stricter caps off-peak to protect delivery ETAs.
pub fn offpeak_policy() -> BatchingPolicy {
    BatchingPolicy {
        enable_continuous_chaining: false,
        pair_detour_cap: 1.10,
        multi_detour_cap: 1.18,
        max_wait_time_seconds: 120.0,
        ..default_policy()
    }
}
