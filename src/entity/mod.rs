//! Entity identity and cached snapshots

pub mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};

pub use snapshot::{EnemyClass, EntitySnapshot};

/// Unique identifier for entities in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

impl EntityId {
    /// Generate a new unique entity ID
    pub fn new() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value (useful for debugging)
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Create an EntityId from a raw u64
    pub fn from_raw(id: u64) -> Self {
        // Keep the counter ahead of any externally supplied ID
        NEXT_ENTITY_ID.fetch_max(id + 1, Ordering::Relaxed);
        EntityId(id)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}
