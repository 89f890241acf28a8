//! Hold registers: versioned, last-writer-wins slots keyed by name.
//!
//! Each register remembers the statement currently standing for its key.
//! A write only lands if its version is strictly greater than the stored
//! one, so out-of-order writers cannot roll a register back.

use parking_lot::Mutex;
use tessera_foundation::{Capacity, Error, Result, StatementRef};

#[derive(Debug, Default)]
struct HoldSlot {
    key: Option<String>,
    version: Option<i64>,
    statement: StatementRef,
}

/// What a call to [`HoldTable::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// The new statement is installed. `old` is the statement it displaced,
    /// which the caller must tear down.
    Replaced {
        /// The displaced statement, if the key held one.
        old: Option<StatementRef>,
        /// The newly installed statement.
        new: StatementRef,
        /// The version now stored.
        version: i64,
    },
    /// The stored version was newer or equal; nothing changed.
    Unchanged {
        /// The statement still installed.
        current: StatementRef,
        /// The version still stored.
        version: i64,
    },
}

impl HoldOutcome {
    /// The statement installed after the call.
    #[must_use]
    pub fn statement(&self) -> StatementRef {
        match *self {
            Self::Replaced { new, .. } => new,
            Self::Unchanged { current, .. } => current,
        }
    }
}

/// A fixed table of hold registers.
#[derive(Debug)]
pub struct HoldTable {
    slots: Box<[Mutex<HoldSlot>]>,
    claim: Mutex<()>,
}

impl HoldTable {
    /// Creates a table with room for `capacity` keys.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Mutex::new(HoldSlot::default())).collect(),
            claim: Mutex::new(()),
        }
    }

    /// Number of registers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of keys in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.lock().key.is_some())
            .count()
    }

    /// Returns true if no key is in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored version and statement for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<(i64, StatementRef)> {
        self.slots.iter().find_map(|slot| {
            let slot = slot.lock();
            if slot.key.as_deref() == Some(key) {
                slot.version.map(|v| (v, slot.statement))
            } else {
                None
            }
        })
    }

    /// Installs a new statement for `key` if `version` is newer.
    ///
    /// A negative `version` means one past the stored version (0 for a new
    /// key). `install` receives the statement being displaced and must
    /// return the new statement; it runs with the register locked, so
    /// installs are linearizable per key.
    ///
    /// Fails with `CapacityExhausted` if the key is new and no register is
    /// free, or with whatever `install` returns.
    pub fn update<F>(&self, key: &str, version: i64, install: F) -> Result<HoldOutcome>
    where
        F: FnOnce(Option<StatementRef>) -> Result<StatementRef>,
    {
        let mut slot = self.find_or_claim(key)?;

        let version = if version < 0 {
            slot.version.map_or(0, |v| v + 1)
        } else {
            version
        };

        if let Some(stored) = slot.version {
            if version <= stored {
                return Ok(HoldOutcome::Unchanged {
                    current: slot.statement,
                    version: stored,
                });
            }
        }

        let old = slot.version.map(|_| slot.statement);
        match install(old) {
            Ok(new) => {
                slot.version = Some(version);
                slot.statement = new;
                Ok(HoldOutcome::Replaced { old, new, version })
            }
            Err(err) => {
                if slot.version.is_none() {
                    slot.key = None;
                }
                Err(err)
            }
        }
    }

    fn find_or_claim(&self, key: &str) -> Result<parking_lot::MutexGuard<'_, HoldSlot>> {
        if let Some(slot) = self.find(key) {
            return Ok(slot);
        }
        let _claim = self.claim.lock();
        // Someone may have claimed the key while we waited.
        if let Some(slot) = self.find(key) {
            return Ok(slot);
        }
        for slot in &self.slots {
            let mut slot = slot.lock();
            if slot.key.is_none() {
                slot.key = Some(key.to_string());
                slot.version = None;
                slot.statement = StatementRef::NULL;
                return Ok(slot);
            }
        }
        Err(Error::capacity_exhausted(Capacity::HoldTable {
            limit: self.slots.len(),
        }))
    }

    fn find(&self, key: &str) -> Option<parking_lot::MutexGuard<'_, HoldSlot>> {
        self.slots.iter().find_map(|slot| {
            let slot = slot.lock();
            (slot.key.as_deref() == Some(key)).then_some(slot)
        })
    }
}
