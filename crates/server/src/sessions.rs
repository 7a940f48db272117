//! Loaded worlds and which sessions are looking at them.

use std::collections::{BTreeMap, BTreeSet};

use texter_core::{ObserverRegistry, SessionId, WorldId, WorldRef, WorldResolver};
use tracing::debug;

#[derive(Debug, Clone)]
struct WorldEntry {
    name: String,
    sessions: BTreeSet<SessionId>,
}

/// In-process observer registry.
#[derive(Debug, Clone, Default)]
pub struct WorldSessions {
    worlds: BTreeMap<WorldId, WorldEntry>,
    by_name: BTreeMap<String, WorldId>,
    session_world: BTreeMap<SessionId, WorldId>,
    next_world: u32,
}

impl WorldSessions {
    /// Registry with no worlds loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `name`, or return the existing handle if it is already loaded.
    pub fn load_world(&mut self, name: &str) -> WorldRef {
        if let Some(id) = self.by_name.get(name) {
            return WorldRef::new(*id, name);
        }

        let id = WorldId(self.next_world);
        self.next_world += 1;
        self.worlds.insert(
            id,
            WorldEntry {
                name: name.to_string(),
                sessions: BTreeSet::new(),
            },
        );
        self.by_name.insert(name.to_string(), id);
        debug!(world = name, id = id.0, "Loaded world");
        WorldRef::new(id, name)
    }

    /// Handle for a loaded world.
    pub fn world(&self, id: WorldId) -> Option<WorldRef> {
        self.worlds
            .get(&id)
            .map(|entry| WorldRef::new(id, entry.name.clone()))
    }

    /// Every loaded world, ordered by id.
    pub fn worlds(&self) -> Vec<WorldRef> {
        self.worlds
            .iter()
            .map(|(id, entry)| WorldRef::new(*id, entry.name.clone()))
            .collect()
    }

    /// Put `session` in `world`, returning the world it was in before.
    ///
    /// Unknown worlds are refused and leave the session where it was.
    pub fn join(&mut self, session: SessionId, world: WorldId) -> Option<WorldId> {
        if !self.worlds.contains_key(&world) {
            return self.session_world.get(&session).copied();
        }

        let previous = self.leave(session);
        if let Some(entry) = self.worlds.get_mut(&world) {
            entry.sessions.insert(session);
        }
        self.session_world.insert(session, world);
        previous
    }

    /// Take `session` out of whatever world it was viewing.
    pub fn leave(&mut self, session: SessionId) -> Option<WorldId> {
        let previous = self.session_world.remove(&session)?;
        if let Some(entry) = self.worlds.get_mut(&previous) {
            entry.sessions.remove(&session);
        }
        Some(previous)
    }

    /// World `session` is currently viewing.
    pub fn world_of(&self, session: SessionId) -> Option<WorldId> {
        self.session_world.get(&session).copied()
    }

    /// Number of connected sessions across all worlds.
    pub fn session_count(&self) -> usize {
        self.session_world.len()
    }
}

impl ObserverRegistry for WorldSessions {
    fn observers_of(&self, world: WorldId) -> Vec<SessionId> {
        self.worlds
            .get(&world)
            .map(|entry| entry.sessions.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl WorldResolver for WorldSessions {
    fn world_by_name(&self, name: &str) -> Option<WorldRef> {
        self.by_name.get(name).map(|id| WorldRef::new(*id, name))
    }
}
