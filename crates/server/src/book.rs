//! Label registry for a running host.
//!
//! [`LabelBook`] owns every live label, keyed by entity id, and routes all
//! changes through its [`Synchronizer`].

use std::collections::BTreeMap;

use texter_core::{
    DVec3, EntityId, Label, LabelError, Lifecycle, ObserverRegistry, SessionId, WorldId,
    WorldRef, WorldResolver,
};
use texter_net::SessionTransport;
use texter_store::{LabelStore, StoreError};
use tracing::{debug, info, warn};

use crate::handle::LabelHandle;
use crate::sessions::WorldSessions;
use crate::sync::{SendType, Synchronizer};

/// Live labels plus the synchronizer that persists and broadcasts them.
pub struct LabelBook<S, O, T> {
    sync: Synchronizer<S, O, T>,
    labels: BTreeMap<EntityId, Label>,
}

impl<S, O, T> LabelBook<S, O, T>
where
    S: LabelStore,
    O: ObserverRegistry,
    T: SessionTransport,
{
    /// Empty book.
    pub fn new(sync: Synchronizer<S, O, T>) -> Self {
        Self {
            sync,
            labels: BTreeMap::new(),
        }
    }

    /// The synchronizer.
    pub fn sync(&self) -> &Synchronizer<S, O, T> {
        &self.sync
    }

    /// Mutable synchronizer.
    pub fn sync_mut(&mut self) -> &mut Synchronizer<S, O, T> {
        &mut self.sync
    }

    /// Create, persist, and announce a label.
    ///
    /// A label whose initial insert fails is dropped and never tracked.
    pub fn spawn(
        &mut self,
        world: WorldRef,
        position: DVec3,
        title: &str,
        text: &str,
    ) -> Result<EntityId, LabelError> {
        let label = self.sync.create(world, position, title, text);
        let entity_id = label.entity_id();
        if label.failed() {
            return Err(LabelError::PersistenceFailure {
                entity_id,
                reason: "label was not persisted".to_string(),
            });
        }
        self.labels.insert(entity_id, label);
        Ok(entity_id)
    }

    /// Label with `entity_id`.
    pub fn get(&self, entity_id: EntityId) -> Option<&Label> {
        self.labels.get(&entity_id)
    }

    /// Every tracked label, ordered by entity id.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    /// Number of tracked labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels living in `world`.
    pub fn in_world(&self, world: WorldId) -> impl Iterator<Item = &Label> {
        self.labels
            .values()
            .filter(move |label| label.world().id() == world)
    }

    /// Run chained setters against one label.
    ///
    /// The book follows entity-id changes and forgets labels the closure
    /// removed. Moving onto an id another tracked label holds is refused, and
    /// ids moved to are reserved so `spawn` never hands them out. Returns
    /// `None` for unknown ids.
    pub fn edit<R>(
        &mut self,
        entity_id: EntityId,
        change: impl FnOnce(&mut LabelHandle<'_, S, O, T>) -> R,
    ) -> Option<R> {
        let mut label = self.labels.remove(&entity_id)?;
        let result = change(&mut self.sync.bind(&mut label).with_occupied(&self.labels));

        if label.lifecycle() == Lifecycle::Removed {
            debug!(entity_id, "Label left the book");
            return Some(result);
        }

        let key = label.entity_id();
        if key != entity_id {
            self.sync.ids().reserve_through(key);
            debug!(from = entity_id, to = key, "Label re-keyed");
        }
        self.labels.insert(key, label);
        Some(result)
    }

    /// Delete a label and tell its world. Returns the label as it was removed.
    pub fn remove(&mut self, entity_id: EntityId) -> Option<Label> {
        let mut label = self.labels.remove(&entity_id)?;
        self.sync.remove(&mut label);
        Some(label)
    }
}

impl<S, O, T> LabelBook<S, O, T>
where
    S: LabelStore,
    O: ObserverRegistry + WorldResolver,
    T: SessionTransport,
{
    /// Reload every stored label. Nothing is broadcast.
    ///
    /// Records whose world is not loaded are skipped with a warning, but
    /// their ids stay reserved. Returns how many labels were restored.
    pub fn restore(&mut self) -> Result<usize, StoreError> {
        let records = self.sync.store().load_all()?;
        let mut restored = 0;

        for record in records {
            self.sync.ids().reserve_through(record.entity_id);
            let Some(world) = self.sync.observers().world_by_name(&record.world) else {
                warn!(
                    entity_id = record.entity_id,
                    world = %record.world,
                    "Skipping label in unloaded world"
                );
                continue;
            };
            let label = record.into_label(world);
            self.labels.insert(label.entity_id(), label);
            restored += 1;
        }

        info!(restored, "Restored labels");
        Ok(restored)
    }
}

impl<S, T> LabelBook<S, WorldSessions, T>
where
    S: LabelStore,
    T: SessionTransport,
{
    /// Put `session` into `world`, sending it the labels it can now see and
    /// dropping the ones it can't.
    ///
    /// Returns `false` when `world` is not loaded.
    pub fn join(&mut self, session: SessionId, world: &WorldRef) -> bool {
        if self.sync.observers().world(world.id()).is_none() {
            return false;
        }

        let previous = self.sync.observers_mut().join(session, world.id());
        if previous == Some(world.id()) {
            return true;
        }

        if let Some(previous) = previous {
            for label in self.in_world(previous) {
                self.sync.send_to_session(label, SendType::Remove, session);
            }
        }
        for label in self.in_world(world.id()).filter(|label| !label.failed()) {
            self.sync.send_to_session(label, SendType::Add, session);
        }
        info!(%session, world = %world, "Session joined world");
        true
    }

    /// Move `session` to the world called `name`.
    pub fn move_session(&mut self, session: SessionId, name: &str) -> Result<WorldRef, LabelError> {
        let world = self
            .sync
            .observers()
            .world_by_name(name)
            .ok_or_else(|| LabelError::UnresolvedWorldReference(name.to_string()))?;
        self.join(session, &world);
        Ok(world)
    }

    /// Forget `session`. The client is gone, so nothing is sent.
    pub fn leave(&mut self, session: SessionId) -> Option<WorldId> {
        let previous = self.sync.observers_mut().leave(session);
        if previous.is_some() {
            info!(%session, "Session left");
        }
        previous
    }
}
