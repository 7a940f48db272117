//! Label data model.
//!
//! A label is a floating piece of text anchored in a world. Clients see it as
//! a zero-scale entity whose nametag carries the title and body text.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::identity::EntityId;
use crate::world::WorldRef;

/// Marker that authors type where they want a line break.
pub const NEWLINE_MARKER: char = '#';

/// Replace every newline marker with a real line break.
///
/// Idempotent: the output never contains the marker.
pub fn translate_newlines(input: &str) -> String {
    input.replace(NEWLINE_MARKER, "\n")
}

/// Observer-visible lifecycle of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Constructed, initial persistence not yet attempted.
    Uncommitted,
    /// Persisted and visible to observers.
    Active,
    /// Initial persistence failed; not broadcast while in this state. A later
    /// change that persists promotes the label to `Active`.
    Failed,
    /// Record deleted and clients told to drop the entity.
    Removed,
}

/// Persisted label fields, one variant per mutation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// X coordinate.
    X,
    /// Y coordinate.
    Y,
    /// Z coordinate.
    Z,
    /// All three coordinates at once.
    Position,
    /// Nametag title.
    Title,
    /// Body text under the title.
    Text,
    /// Invisibility flag.
    Invisible,
    /// Wire identity.
    EntityId,
    /// Owning world.
    World,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Field; 9] = [
        Field::X,
        Field::Y,
        Field::Z,
        Field::Position,
        Field::Title,
        Field::Text,
        Field::Invisible,
        Field::EntityId,
        Field::World,
    ];

    /// Name used in logs and config files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Field::X => "x",
            Field::Y => "y",
            Field::Z => "z",
            Field::Position => "position",
            Field::Title => "title",
            Field::Text => "text",
            Field::Invisible => "invisible",
            Field::EntityId => "entity_id",
            Field::World => "world",
        }
    }

    /// Inverse of [`Field::as_str`].
    pub fn parse(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

/// A new value for one field.
///
/// [`Label::apply`] returns the mutation that restores the previous value,
/// which is what rollback feeds back in.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set the x coordinate.
    X(f64),
    /// Set the y coordinate.
    Y(f64),
    /// Set the z coordinate.
    Z(f64),
    /// Set all coordinates.
    Position(DVec3),
    /// Set the title (newline markers are translated).
    Title(String),
    /// Set the body text (newline markers are translated).
    Text(String),
    /// Show or hide the entity itself.
    Invisible(bool),
    /// Reassign the wire identity.
    EntityId(EntityId),
    /// Move to another world.
    World(WorldRef),
}

impl Mutation {
    /// Field this mutation writes.
    pub fn field(&self) -> Field {
        match self {
            Mutation::X(_) => Field::X,
            Mutation::Y(_) => Field::Y,
            Mutation::Z(_) => Field::Z,
            Mutation::Position(_) => Field::Position,
            Mutation::Title(_) => Field::Title,
            Mutation::Text(_) => Field::Text,
            Mutation::Invisible(_) => Field::Invisible,
            Mutation::EntityId(_) => Field::EntityId,
            Mutation::World(_) => Field::World,
        }
    }

    /// Same mutation with text values in their stored form.
    pub fn normalized(self) -> Self {
        match self {
            Mutation::Title(title) => Mutation::Title(translate_newlines(&title)),
            Mutation::Text(text) => Mutation::Text(translate_newlines(&text)),
            other => other,
        }
    }
}

/// A text label anchored in a world.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    world: WorldRef,
    position: DVec3,
    title: String,
    text: String,
    invisible: bool,
    entity_id: EntityId,
    failed: bool,
    lifecycle: Lifecycle,
}

impl Label {
    /// Build an uncommitted label. Nothing is persisted or sent.
    pub fn new(
        world: WorldRef,
        position: DVec3,
        title: &str,
        text: &str,
        entity_id: EntityId,
    ) -> Self {
        Self {
            world,
            position,
            title: translate_newlines(title),
            text: translate_newlines(text),
            invisible: false,
            entity_id,
            failed: false,
            lifecycle: Lifecycle::Uncommitted,
        }
    }

    /// World the label lives in.
    pub fn world(&self) -> &WorldRef {
        &self.world
    }

    /// X coordinate.
    pub fn x(&self) -> f64 {
        self.position.x
    }

    /// Y coordinate.
    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Z coordinate.
    pub fn z(&self) -> f64 {
        self.position.z
    }

    /// Position as a vector.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Title line(s).
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the carrier entity is hidden (the nametag still shows).
    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    /// Wire identity.
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Whether initial persistence failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Overwrite the failed flag.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Move the label to another lifecycle state.
    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    /// Write a new value in memory and return the mutation that undoes it.
    ///
    /// Persistence and broadcasting are the synchronizer's job.
    pub fn apply(&mut self, mutation: Mutation) -> Mutation {
        match mutation {
            Mutation::X(x) => Mutation::X(std::mem::replace(&mut self.position.x, x)),
            Mutation::Y(y) => Mutation::Y(std::mem::replace(&mut self.position.y, y)),
            Mutation::Z(z) => Mutation::Z(std::mem::replace(&mut self.position.z, z)),
            Mutation::Position(pos) => {
                Mutation::Position(std::mem::replace(&mut self.position, pos))
            }
            Mutation::Title(title) => Mutation::Title(std::mem::replace(
                &mut self.title,
                translate_newlines(&title),
            )),
            Mutation::Text(text) => Mutation::Text(std::mem::replace(
                &mut self.text,
                translate_newlines(&text),
            )),
            Mutation::Invisible(invisible) => {
                Mutation::Invisible(std::mem::replace(&mut self.invisible, invisible))
            }
            Mutation::EntityId(id) => {
                Mutation::EntityId(std::mem::replace(&mut self.entity_id, id))
            }
            Mutation::World(world) => Mutation::World(std::mem::replace(&mut self.world, world)),
        }
    }
}
