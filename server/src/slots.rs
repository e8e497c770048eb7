//! Free-list allocator for entity table slots.

use crate::error::ArenaError;
use std::fmt;

/// Index of a ball in the entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// LIFO stack of free slot indices.
///
/// Whoever pops a slot owns it until it is published into the entity table.
/// Releasing a slot twice is a caller bug; the allocator does not guard
/// against it beyond a debug assertion.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    free: Vec<Slot>,
    capacity: usize,
}

impl SlotAllocator {
    /// Creates an allocator with every slot in `[0, capacity)` free.
    /// Slot 0 is handed out first.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: (0..capacity).rev().map(Slot).collect(),
            capacity,
        }
    }

    pub fn acquire(&mut self) -> Result<Slot, ArenaError> {
        self.free.pop().ok_or(ArenaError::Exhausted)
    }

    pub fn release(&mut self, slot: Slot) {
        debug_assert!(slot.0 < self.capacity, "slot {} out of range", slot);
        debug_assert!(!self.free.contains(&slot), "slot {} released twice", slot);
        self.free.push(slot);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_free(&self, slot: Slot) -> bool {
        self.free.contains(&slot)
    }
}
