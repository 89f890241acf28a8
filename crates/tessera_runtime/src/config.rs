//! Runtime configuration.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tessera_foundation::{DbConfig, SchedulerConfig};

/// Everything needed to start a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuntimeConfig {
    /// Database capacities.
    pub db: DbConfig,

    /// Worker pool tuning.
    pub scheduler: SchedulerConfig,

    /// Hold `monitor claims the clock time is <seconds>` on every monitor tick.
    pub clock_hold: bool,

    /// Maximum number of pending [`remove_later`](crate::Handle::remove_later) entries.
    pub remove_later_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            scheduler: SchedulerConfig::default(),
            clock_hold: false,
            remove_later_capacity: 4096,
        }
    }
}

impl RuntimeConfig {
    /// Small tables and two fixed workers, for tests.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            db: DbConfig::small(),
            scheduler: SchedulerConfig::fixed(2).with_monitor_tick(Duration::from_millis(1)),
            clock_hold: false,
            remove_later_capacity: 64,
        }
    }

    /// Builder method to replace the database config.
    #[must_use]
    pub fn with_db(mut self, db: DbConfig) -> Self {
        self.db = db;
        self
    }

    /// Builder method to replace the scheduler config.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Builder method to toggle the clock hold.
    #[must_use]
    pub fn with_clock_hold(mut self, enabled: bool) -> Self {
        self.clock_hold = enabled;
        self
    }

    /// Builder method to size the remove-later table.
    #[must_use]
    pub fn with_remove_later_capacity(mut self, capacity: usize) -> Self {
        self.remove_later_capacity = capacity;
        self
    }
}
