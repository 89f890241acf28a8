//! Fixed-capacity entity pools with generation-checked acquisition.
//!
//! Each slot packs its generation and acquire count into one atomic word
//! (`generation << 32 | acquires`). The protocol:
//!
//! - `acquire` increments the count *before* comparing generations, so a
//!   slot can never be recycled while a reader is checking it. On mismatch
//!   the increment is undone and the caller gets `None`.
//! - Dropping the last acquisition of an entity that is no longer
//!   [sustained](Entity::is_sustained) advances the generation first and
//!   only then drops the payload, so every outstanding reference goes stale
//!   before the memory is released.
//! - Allocation claims a free slot by moving its count from 0 to 1, fills
//!   it while nobody else can see it, and hands the claim back as an
//!   [`Acquired`] guard.
//!
//! Slot 0 is reserved in every pool so that the zero reference is null.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tessera_foundation::{AnyRef, Capacity, Error, MatchRef, Result, StatementRef};

const COUNT_MASK: u64 = 0xffff_ffff;

#[inline]
fn pack(generation: u32, count: u32) -> u64 {
    (u64::from(generation) << 32) | u64::from(count)
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn generation_of(word: u64) -> u32 {
    (word >> 32) as u32
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn count_of(word: u64) -> u32 {
    (word & COUNT_MASK) as u32
}

/// A generational reference type that can address a pool slot.
pub trait SlotRef: Copy + Eq + fmt::Debug + Into<AnyRef> + Send + Sync + 'static {
    /// Builds a reference from slot index and generation.
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Returns the slot index.
    fn index(self) -> u32;
    /// Returns the generation.
    fn generation(self) -> u32;
}

impl SlotRef for StatementRef {
    fn from_parts(index: u32, generation: u32) -> Self {
        Self::new(index, generation)
    }
    fn index(self) -> u32 {
        self.index
    }
    fn generation(self) -> u32 {
        self.generation
    }
}

impl SlotRef for MatchRef {
    fn from_parts(index: u32, generation: u32) -> Self {
        Self::new(index, generation)
    }
    fn index(self) -> u32 {
        self.index
    }
    fn generation(self) -> u32 {
        self.generation
    }
}

/// Something that can live in a [`Pool`].
pub trait Entity: Send + Sync + 'static {
    /// The reference type that names this entity.
    type Ref: SlotRef;

    /// True while something other than an acquisition keeps the entity
    /// alive. Once false and unacquired, the slot is reclaimed.
    fn is_sustained(&self) -> bool;

    /// The error reported when the pool is full.
    fn exhausted(limit: usize) -> Capacity;
}

struct Slot<T> {
    state: AtomicU64,
    payload: RwLock<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            payload: RwLock::new(None),
        }
    }
}

/// A fixed-capacity pool of entities addressed by generational references.
pub struct Pool<T: Entity> {
    slots: Box<[Slot<T>]>,
    cursor: AtomicUsize,
    live: AtomicUsize,
}

impl<T: Entity> Pool<T> {
    /// Creates a pool with `capacity` slots (slot 0 included).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(2, u32::MAX as usize);
        Self {
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            cursor: AtomicUsize::new(1),
            live: AtomicUsize::new(0),
        }
    }

    /// Total number of slots, including the reserved one.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Stores `entity` in a free slot and returns it already acquired.
    ///
    /// Fails with `CapacityExhausted` if every slot is in use.
    #[allow(clippy::cast_possible_truncation)]
    pub fn allocate(&self, entity: T) -> Result<Acquired<'_, T>> {
        let capacity = self.slots.len();
        for _ in 0..capacity {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % capacity;
            if index == 0 {
                continue;
            }
            let slot = &self.slots[index];
            let word = slot.state.load(Ordering::SeqCst);
            if count_of(word) != 0 || slot.payload.read().is_some() {
                continue;
            }
            let generation = generation_of(word);
            if slot
                .state
                .compare_exchange(
                    word,
                    pack(generation, 1),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
            {
                continue;
            }

            let mut payload = slot.payload.write();
            if payload.is_some() {
                // Another allocator filled and released this slot between our
                // check and our claim.
                drop(payload);
                self.release_index(index);
                continue;
            }
            let entity = Arc::new(entity);
            *payload = Some(Arc::clone(&entity));
            drop(payload);
            self.live.fetch_add(1, Ordering::SeqCst);
            return Ok(Acquired {
                pool: self,
                reference: T::Ref::from_parts(index as u32, generation),
                entity,
                armed: true,
            });
        }
        Err(Error::capacity_exhausted(T::exhausted(capacity)))
    }

    /// Pins the entity named by `r` for the lifetime of the returned guard.
    ///
    /// Returns `None` if the slot has been recycled since `r` was issued.
    #[must_use]
    pub fn acquire(&self, r: T::Ref) -> Option<Acquired<'_, T>> {
        let index = r.index() as usize;
        if index == 0 {
            return None;
        }
        let slot = self.slots.get(index)?;
        let word = slot.state.fetch_add(1, Ordering::SeqCst);
        if generation_of(word) != r.generation() {
            self.release_index(index);
            return None;
        }
        let Some(entity) = slot.payload.read().clone() else {
            self.release_index(index);
            return None;
        };
        Some(Acquired {
            pool: self,
            reference: r,
            entity,
            armed: true,
        })
    }

    /// Returns true if `r` still names a live entity.
    #[must_use]
    pub fn contains(&self, r: T::Ref) -> bool {
        self.acquire(r).is_some()
    }

    /// Acquires `r` without a guard. Pair with [`release`](Self::release).
    ///
    /// Used by callers that hold pins across calls that cannot carry a
    /// borrow, such as an embedded evaluator.
    pub fn pin(&self, r: T::Ref) -> Result<()> {
        self.acquire(r).ok_or_else(|| Error::stale_ref(r))?.leak();
        Ok(())
    }

    /// Releases one acquisition previously taken with [`pin`](Self::pin).
    ///
    /// A reference whose slot has no outstanding acquisitions at its
    /// generation is rejected as stale.
    pub fn release(&self, r: T::Ref) -> Result<()> {
        let index = r.index() as usize;
        let slot = self
            .slots
            .get(index)
            .filter(|_| index != 0)
            .ok_or_else(|| Error::stale_ref(r))?;
        let word = slot.state.load(Ordering::SeqCst);
        if generation_of(word) != r.generation() || count_of(word) == 0 {
            return Err(Error::stale_ref(r));
        }
        self.release_index(index);
        Ok(())
    }

    /// Reclaims `r` if it is no longer sustained and nobody holds it.
    ///
    /// Call after clearing whatever sustained the entity.
    pub fn reclaim(&self, r: T::Ref) {
        drop(self.acquire(r));
    }

    /// Returns the current generation of a slot.
    #[must_use]
    pub fn generation(&self, index: u32) -> Option<u32> {
        self.slots
            .get(index as usize)
            .map(|slot| generation_of(slot.state.load(Ordering::SeqCst)))
    }

    /// Returns the current acquire count of a slot.
    #[must_use]
    pub fn acquire_count(&self, index: u32) -> Option<u32> {
        self.slots
            .get(index as usize)
            .map(|slot| count_of(slot.state.load(Ordering::SeqCst)))
    }

    /// Snapshot of references to every occupied slot.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn refs(&self) -> Vec<T::Ref> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| slot.payload.read().is_some())
            .map(|(index, slot)| {
                let generation = generation_of(slot.state.load(Ordering::SeqCst));
                T::Ref::from_parts(index as u32, generation)
            })
            .collect()
    }

    fn release_index(&self, index: usize) {
        let word = self.slots[index].state.fetch_sub(1, Ordering::SeqCst);
        if count_of(word) == 1 {
            self.maybe_reclaim(index, generation_of(word));
        }
    }

    fn maybe_reclaim(&self, index: usize, generation: u32) {
        let slot = &self.slots[index];
        loop {
            // Exclusive claim: only succeeds while nobody holds the slot.
            if slot
                .state
                .compare_exchange(
                    pack(generation, 0),
                    pack(generation, 1),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
            {
                return;
            }

            let Some(entity) = slot.payload.read().clone() else {
                slot.state.fetch_sub(1, Ordering::SeqCst);
                return;
            };

            if !entity.is_sustained() {
                let fenced = slot.state.compare_exchange(
                    pack(generation, 1),
                    pack(generation.wrapping_add(1), 1),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                if fenced.is_ok() {
                    slot.payload.write().take();
                    self.live.fetch_sub(1, Ordering::SeqCst);
                    slot.state.fetch_sub(1, Ordering::SeqCst);
                    tracing::trace!(index, generation, "reclaimed slot");
                } else {
                    // A late acquirer got in; its release will retry.
                    self.release_index(index);
                }
                return;
            }

            slot.state.fetch_sub(1, Ordering::SeqCst);
            // The sustain may have been dropped while we held the claim, in
            // which case its owner saw a nonzero count and left the work to us.
            if entity.is_sustained() {
                return;
            }
        }
    }
}

impl<T: Entity> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("live", &self.live())
            .finish_non_exhaustive()
    }
}

/// An acquired entity. Releases its acquisition on drop.
pub struct Acquired<'a, T: Entity> {
    pool: &'a Pool<T>,
    reference: T::Ref,
    entity: Arc<T>,
    armed: bool,
}

impl<T: Entity> Acquired<'_, T> {
    /// The reference this guard was acquired through.
    #[must_use]
    pub fn reference(&self) -> T::Ref {
        self.reference
    }

    /// Keeps the acquisition alive past this guard.
    ///
    /// The caller takes over the obligation to call [`Pool::release`].
    pub fn leak(mut self) -> T::Ref {
        self.armed = false;
        self.reference
    }
}

impl<T: Entity> Clone for Acquired<'_, T> {
    fn clone(&self) -> Self {
        let index = self.reference.index() as usize;
        self.pool.slots[index].state.fetch_add(1, Ordering::SeqCst);
        Self {
            pool: self.pool,
            reference: self.reference,
            entity: Arc::clone(&self.entity),
            armed: true,
        }
    }
}

impl<T: Entity> Deref for Acquired<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<T: Entity> Drop for Acquired<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release_index(self.reference.index() as usize);
        }
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for Acquired<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("reference", &self.reference)
            .field("entity", &*self.entity)
            .finish()
    }
}
