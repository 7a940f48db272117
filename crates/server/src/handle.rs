//! Chained setters over the two-phase API.
//!
//! Each setter stages and commits one mutation and hands the handle back, so
//! calls read like `handle.set_x(4).set_title("Shop")`. Failures never escape
//! a setter; they show up as an unchanged value.

use std::collections::BTreeMap;
use std::ops::Deref;

use texter_core::{
    DVec3, EntityId, Label, LabelError, Mutation, ObserverRegistry, ToCoordinate, WorldRef,
    WorldResolver,
};
use texter_net::SessionTransport;
use texter_store::LabelStore;
use tracing::debug;

use crate::sync::Synchronizer;

/// A label bound to the synchronizer that owns its side effects.
pub struct LabelHandle<'a, S, O, T> {
    sync: &'a mut Synchronizer<S, O, T>,
    label: &'a mut Label,
    occupied: Option<&'a BTreeMap<EntityId, Label>>,
}

impl<'a, S, O, T> LabelHandle<'a, S, O, T>
where
    S: LabelStore,
    O: ObserverRegistry,
    T: SessionTransport,
{
    pub(crate) fn new(sync: &'a mut Synchronizer<S, O, T>, label: &'a mut Label) -> Self {
        Self {
            sync,
            label,
            occupied: None,
        }
    }

    /// Refuse entity-id changes onto any key of `occupied`.
    pub(crate) fn with_occupied(mut self, occupied: &'a BTreeMap<EntityId, Label>) -> Self {
        self.occupied = Some(occupied);
        self
    }

    /// The label as it currently stands.
    pub fn label(&self) -> &Label {
        self.label
    }

    fn apply(&mut self, mutation: Mutation) -> &mut Self {
        match self.sync.stage(self.label, mutation) {
            Ok(change) => {
                self.sync.commit(self.label, change);
            }
            Err(err) => debug!(entity_id = self.label.entity_id(), "Ignoring mutation: {err}"),
        }
        self
    }

    fn apply_coordinate(
        &mut self,
        field: &'static str,
        value: impl ToCoordinate,
        build: fn(f64) -> Mutation,
    ) -> &mut Self {
        match value.to_coordinate() {
            Some(value) => self.apply(build(value)),
            None => {
                debug!(entity_id = self.label.entity_id(), field, "Ignoring non-numeric coordinate");
                self
            }
        }
    }

    /// Set the x coordinate. Non-numeric input is ignored.
    pub fn set_x(&mut self, x: impl ToCoordinate) -> &mut Self {
        self.apply_coordinate("x", x, Mutation::X)
    }

    /// Set the y coordinate. Non-numeric input is ignored.
    pub fn set_y(&mut self, y: impl ToCoordinate) -> &mut Self {
        self.apply_coordinate("y", y, Mutation::Y)
    }

    /// Set the z coordinate. Non-numeric input is ignored.
    pub fn set_z(&mut self, z: impl ToCoordinate) -> &mut Self {
        self.apply_coordinate("z", z, Mutation::Z)
    }

    /// Set all three coordinates.
    pub fn set_position(&mut self, position: DVec3) -> &mut Self {
        self.apply(Mutation::Position(position))
    }

    /// Set the title; `#` becomes a line break.
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.apply(Mutation::Title(title.to_string()))
    }

    /// Set the body text; `#` becomes a line break.
    pub fn set_text(&mut self, text: &str) -> &mut Self {
        self.apply(Mutation::Text(text.to_string()))
    }

    /// Hide or show the carrier entity.
    pub fn set_invisible(&mut self, invisible: bool) -> &mut Self {
        self.apply(Mutation::Invisible(invisible))
    }

    /// Reassign the wire identity. Ids held by other live labels are refused.
    pub fn set_entity_id(&mut self, entity_id: EntityId) -> &mut Self {
        let taken = entity_id != self.label.entity_id()
            && self.occupied.is_some_and(|ids| ids.contains_key(&entity_id));
        if taken {
            debug!(
                entity_id = self.label.entity_id(),
                "Ignoring mutation: {}",
                LabelError::EntityIdTaken(entity_id)
            );
            return self;
        }
        self.apply(Mutation::EntityId(entity_id))
    }

    /// Move to another world.
    pub fn set_world(&mut self, world: WorldRef) -> &mut Self {
        self.apply(Mutation::World(world))
    }

    /// Move to the world called `name`; unknown names only re-send the label.
    pub fn set_world_by_name(&mut self, name: &str) -> &mut Self
    where
        O: WorldResolver,
    {
        if let Err(err) = self.sync.relocate_by_name(self.label, name) {
            debug!(entity_id = self.label.entity_id(), "World change skipped: {err}");
        }
        self
    }

    /// Overwrite the failed flag. Not persisted, not broadcast.
    pub fn set_failed(&mut self, failed: bool) -> &mut Self {
        self.label.set_failed(failed);
        self
    }

    /// Delete the record and drop the label from every observer.
    pub fn remove(&mut self) -> bool {
        self.sync.remove(self.label)
    }
}

impl<S, O, T> Deref for LabelHandle<'_, S, O, T> {
    type Target = Label;

    fn deref(&self) -> &Label {
        self.label
    }
}
