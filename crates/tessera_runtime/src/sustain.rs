//! Timed sustains: statements that lose a parent after a delay.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tessera_foundation::{Capacity, Error, Result, StatementRef};

/// A bounded table of pending delayed removals.
#[derive(Debug)]
pub struct RemoveLater {
    capacity: usize,
    entries: Mutex<Vec<(Instant, StatementRef)>>,
}

impl RemoveLater {
    /// Creates a table holding at most `capacity` pending removals.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Schedules `statement` to lose one parent after `delay`.
    ///
    /// Fails with `CapacityExhausted` when the table is full.
    pub fn schedule(&self, statement: StatementRef, delay: Duration) -> Result<()> {
        self.schedule_at(statement, Instant::now() + delay)
    }

    /// Schedules `statement` to lose one parent at `deadline`.
    pub fn schedule_at(&self, statement: StatementRef, deadline: Instant) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            return Err(Error::capacity_exhausted(Capacity::RemoveLater {
                limit: self.capacity,
            }));
        }
        entries.push((deadline, statement));
        Ok(())
    }

    /// Offers every entry whose deadline is at or before `now` to `submit`.
    ///
    /// Entries `submit` accepts leave the table. After the first refusal
    /// nothing more is offered, and every remaining due entry stays for a
    /// later call. Returns how many entries were accepted.
    pub fn drain_due(&self, now: Instant, mut submit: impl FnMut(StatementRef) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let mut accepted = 0;
        let mut refused = false;
        entries.retain(|&(deadline, statement)| {
            if refused || deadline > now {
                return true;
            }
            if submit(statement) {
                accepted += 1;
                false
            } else {
                refused = true;
                true
            }
        });
        accepted
    }

    /// Number of pending removals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
