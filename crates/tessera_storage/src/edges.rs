//! Growable edge lists with tombstoned removal.

/// A list of edges where removal leaves a hole instead of shifting.
///
/// When the backing storage is full, holes are compacted away before the
/// capacity is doubled, so lists whose contents churn do not grow without
/// bound.
#[derive(Clone, Debug)]
pub struct EdgeList<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for EdgeList<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }
}

impl<T: Copy + PartialEq> EdgeList<T> {
    /// Creates an empty list with room for `capacity` edges.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Appends an edge.
    pub fn push(&mut self, edge: T) {
        if self.slots.len() == self.slots.capacity() {
            if self.live < self.slots.len() {
                self.defragment();
            } else {
                let grow = self.slots.capacity().max(1);
                self.slots.reserve_exact(grow);
            }
        }
        self.slots.push(Some(edge));
        self.live += 1;
    }

    /// Marks the first occurrence of `edge` as empty. Returns false if absent.
    pub fn remove(&mut self, edge: &T) -> bool {
        match self.slots.iter_mut().find(|slot| slot.as_ref() == Some(edge)) {
            Some(slot) => {
                *slot = None;
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    /// Returns true if `edge` is present.
    #[must_use]
    pub fn contains(&self, edge: &T) -> bool {
        self.slots.iter().any(|slot| slot.as_ref() == Some(edge))
    }

    /// Number of live edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if there are no live edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots the list can hold before it must compact or grow.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Iterates over live edges in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    /// Removes every edge and returns the live ones.
    pub fn take_all(&mut self) -> Vec<T> {
        let edges = self.iter().collect();
        self.slots.clear();
        self.live = 0;
        edges
    }

    fn defragment(&mut self) {
        self.slots.retain(Option::is_some);
    }
}
