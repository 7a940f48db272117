//! World and session identifiers.
//!
//! Labels, observers, and broadcasts are all world-scoped. The host owns the
//! actual worlds; this crate only carries a stable handle to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric identifier for a loaded world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Handle to the world a label lives in.
///
/// The name is what gets persisted, the id is what the observer registry is
/// keyed on. Two handles are the same world when their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRef {
    id: WorldId,
    name: String,
}

impl WorldRef {
    /// Build a handle from its id and folder name.
    pub fn new(id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Numeric id used for observer lookups.
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Name used for persistence and by-name lookups.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for WorldRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorldRef {}

impl fmt::Display for WorldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// Connected viewer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Live view of which sessions are looking at which world.
pub trait ObserverRegistry {
    /// Sessions currently viewing `world`. Read at broadcast time, never cached.
    fn observers_of(&self, world: WorldId) -> Vec<SessionId>;
}

/// Resolves world names to loaded worlds.
pub trait WorldResolver {
    /// Returns `None` when no loaded world carries `name`.
    fn world_by_name(&self, name: &str) -> Option<WorldRef>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_ref_equality_is_by_id() {
        let a = WorldRef::new(WorldId(1), "world");
        let b = WorldRef::new(WorldId(1), "renamed");
        let c = WorldRef::new(WorldId(2), "world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "world#1");
    }
}
