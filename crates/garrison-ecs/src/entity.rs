//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is an opaque 64-bit handle. Ids are handed out in strictly
//! increasing order starting at 1 and are never recycled for the lifetime of
//! the allocator, so a stale id can never alias a newer entity. Id 0 is never
//! issued and is free for callers to use as "no entity".

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A monotonically increasing entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from its raw value.
    ///
    /// Mostly useful for tests and for ids that arrive over an external
    /// boundary; nothing guarantees the id refers to a live entity.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out fresh [`EntityId`]s.
///
/// The allocator only ever counts upward. Clearing a world does not reset it,
/// which keeps ids unique across the whole lifetime of the owning world.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Create a new allocator. The first id issued is `1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate a fresh [`EntityId`].
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// The id that the next call to [`allocate`](Self::allocate) will return.
    pub fn peek_next(&self) -> EntityId {
        EntityId(self.next)
    }

    /// Whether `id` has ever been issued by this allocator.
    pub fn was_issued(&self, id: EntityId) -> bool {
        id.0 >= 1 && id.0 < self.next
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a.to_raw(), 1);
        assert_eq!(b.to_raw(), 2);
        assert!(a < b);
    }

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let mut ids: Vec<u64> = (0..100).map(|_| alloc.allocate().to_raw()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn peek_matches_next_allocation() {
        let mut alloc = EntityAllocator::new();
        alloc.allocate();
        let peeked = alloc.peek_next();
        assert_eq!(alloc.allocate(), peeked);
    }

    #[test]
    fn was_issued_tracks_history() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.was_issued(e));
        assert!(!alloc.was_issued(EntityId::from_raw(0)));
        assert!(!alloc.was_issued(alloc.peek_next()));
    }

    #[test]
    fn entity_id_roundtrip() {
        let id = EntityId::from_raw(42);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
        assert_eq!(format!("{id}"), "#42");
    }
}
