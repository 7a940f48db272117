//! Entity id allocation.
//!
//! Labels share the entity id space with every other entity the host spawns,
//! so ids come from one process-wide counter. The counter is created at 1 when
//! the process starts and is never reset afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

/// Entity identifier used on the wire.
pub type EntityId = u64;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Source of fresh entity ids.
pub trait IdentityAllocator: Send + Sync {
    /// Allocate the next id. Ids are strictly increasing.
    fn next_entity_id(&self) -> EntityId;

    /// Make sure future ids are greater than `id` (used after restoring labels).
    fn reserve_through(&self, id: EntityId);
}

/// Allocator backed by the process-wide counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEntityCounter;

impl IdentityAllocator for ProcessEntityCounter {
    fn next_entity_id(&self) -> EntityId {
        NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
    }

    fn reserve_through(&self, id: EntityId) {
        NEXT_ENTITY_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }
}

/// Allocator with its own counter, for isolated hosts and tests.
#[derive(Debug)]
pub struct LocalEntityCounter {
    next: AtomicU64,
}

impl LocalEntityCounter {
    /// Counter whose first id is `first`.
    pub fn starting_at(first: EntityId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for LocalEntityCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdentityAllocator for LocalEntityCounter {
    fn next_entity_id(&self) -> EntityId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    fn reserve_through(&self, id: EntityId) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }
}
