//! Tuning parameters for the database and the scheduler.
//!
//! Both configs follow the same builder shape: start from [`Default`] or a
//! preset and adjust with `with_*` methods.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacities of the database's fixed tables.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DbConfig {
    /// Number of statement slots, including the reserved slot 0.
    pub statement_capacity: usize,

    /// Number of match slots, including the reserved slot 0.
    pub match_capacity: usize,

    /// Number of hold registers.
    pub hold_capacity: usize,

    /// Maximum number of bindings a single unification may produce.
    pub max_bindings: usize,

    /// Starting size of a fresh statement or match edge list.
    pub initial_edge_capacity: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            statement_capacity: 1 << 16,
            match_capacity: 1 << 16,
            hold_capacity: 4096,
            max_bindings: 64,
            initial_edge_capacity: 8,
        }
    }
}

impl DbConfig {
    /// A small configuration suitable for unit tests.
    #[must_use]
    pub fn small() -> Self {
        Self {
            statement_capacity: 256,
            match_capacity: 256,
            hold_capacity: 16,
            max_bindings: 16,
            initial_edge_capacity: 2,
        }
    }

    /// Builder method to set the statement pool size.
    #[must_use]
    pub fn with_statement_capacity(mut self, capacity: usize) -> Self {
        self.statement_capacity = capacity;
        self
    }

    /// Builder method to set the match pool size.
    #[must_use]
    pub fn with_match_capacity(mut self, capacity: usize) -> Self {
        self.match_capacity = capacity;
        self
    }

    /// Builder method to set the number of hold registers.
    #[must_use]
    pub fn with_hold_capacity(mut self, capacity: usize) -> Self {
        self.hold_capacity = capacity;
        self
    }

    /// Builder method to set the binding limit.
    #[must_use]
    pub fn with_max_bindings(mut self, max: usize) -> Self {
        self.max_bindings = max;
        self
    }

    /// Builder method to set the initial edge list size.
    #[must_use]
    pub fn with_initial_edge_capacity(mut self, capacity: usize) -> Self {
        self.initial_edge_capacity = capacity;
        self
    }
}

/// Worker pool and queueing parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// Number of workers started up front.
    pub workers: usize,

    /// Capacity of the global overflow queue.
    pub global_queue_capacity: usize,

    /// A worker that has run its current item for less than this submits
    /// follow-up work to its own queue; otherwise to the global queue.
    pub responsive_threshold: Duration,

    /// Every this many ticks a worker checks the global queue before its own.
    pub global_drain_interval: u32,

    /// A worker busy on one item for longer than this is counted as unavailable.
    pub blocked_threshold: Duration,

    /// The monitor keeps at least this many workers available.
    pub min_available_workers: usize,

    /// How many workers the monitor may add beyond `workers`.
    pub max_extra_workers: usize,

    /// Interval between monitor ticks.
    pub monitor_tick: Duration,

    /// How long an idle worker waits for new work before polling again.
    pub idle_wait: Duration,

    /// Seed for the per-worker steal-victim generators.
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            global_queue_capacity: 1 << 16,
            responsive_threshold: Duration::from_millis(1),
            global_drain_interval: 60,
            blocked_threshold: Duration::from_millis(10),
            min_available_workers: 2,
            max_extra_workers: 15,
            monitor_tick: Duration::from_millis(2),
            idle_wait: Duration::from_millis(1),
            seed: 0x7e55_e7a0,
        }
    }
}

impl SchedulerConfig {
    /// A configuration with exactly `workers` workers and no extras.
    #[must_use]
    pub fn fixed(workers: usize) -> Self {
        Self {
            workers,
            max_extra_workers: 0,
            ..Self::default()
        }
    }

    /// Builder method to set the initial worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set the global queue capacity.
    #[must_use]
    pub fn with_global_queue_capacity(mut self, capacity: usize) -> Self {
        self.global_queue_capacity = capacity;
        self
    }

    /// Builder method to set the responsive threshold.
    #[must_use]
    pub fn with_responsive_threshold(mut self, threshold: Duration) -> Self {
        self.responsive_threshold = threshold;
        self
    }

    /// Builder method to set how often workers check the global queue first.
    #[must_use]
    pub fn with_global_drain_interval(mut self, ticks: u32) -> Self {
        self.global_drain_interval = ticks;
        self
    }

    /// Builder method to set the blocked threshold.
    #[must_use]
    pub fn with_blocked_threshold(mut self, threshold: Duration) -> Self {
        self.blocked_threshold = threshold;
        self
    }

    /// Builder method to set the minimum number of available workers.
    #[must_use]
    pub fn with_min_available_workers(mut self, min: usize) -> Self {
        self.min_available_workers = min;
        self
    }

    /// Builder method to set the extra-worker cap.
    #[must_use]
    pub fn with_max_extra_workers(mut self, max: usize) -> Self {
        self.max_extra_workers = max;
        self
    }

    /// Builder method to set the monitor tick interval.
    #[must_use]
    pub fn with_monitor_tick(mut self, tick: Duration) -> Self {
        self.monitor_tick = tick;
        self
    }

    /// Builder method to set the idle wait.
    #[must_use]
    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    /// Builder method to set the steal-victim seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Upper bound on live workers.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.workers.max(1) + self.max_extra_workers
    }
}
