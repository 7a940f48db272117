//! Wire message definitions for label entities.
//!
//! Labels reach clients as player entities with a zero scale and an
//! always-visible nametag. Identity fields are duplicated because different
//! client generations read different ones.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use texter_core::EntityId;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Username carried by every label entity.
pub const LABEL_USERNAME: &str = "text";

/// Formatting reset followed by white, appended after the title.
pub const NAMETAG_RESET: &str = "\u{a7}r\u{a7}f";

/// Metadata key: entity flag bitmask.
pub const DATA_FLAGS: u32 = 0;
/// Metadata key: nametag string.
pub const DATA_NAMETAG: u32 = 4;
/// Metadata key: render scale.
pub const DATA_SCALE: u32 = 39;

/// Metadata type tag for floats.
pub const DATA_TYPE_FLOAT: u8 = 3;
/// Metadata type tag for strings.
pub const DATA_TYPE_STRING: u8 = 4;
/// Metadata type tag for longs.
pub const DATA_TYPE_LONG: u8 = 7;

/// Maximum nametag length accepted by the decoder (bytes).
pub const MAX_NAMETAG_LEN: usize = 8 * 1024;

/// Maximum username length accepted by the decoder (bytes).
pub const MAX_USERNAME_LEN: usize = 32;

/// Maximum number of metadata entries per entity.
pub const MAX_METADATA_ENTRIES: usize = 64;

bitflags! {
    /// Bits of the `DATA_FLAGS` metadata entry used by labels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntityFlags: i64 {
        /// Entity model is not drawn.
        const INVISIBLE = 1 << 5;
        /// Nametag may be shown.
        const CAN_SHOW_NAMETAG = 1 << 14;
        /// Nametag is shown without looking at the entity.
        const ALWAYS_SHOW_NAMETAG = 1 << 15;
        /// Entity does not move or animate.
        const IMMOBILE = 1 << 16;
    }
}

impl EntityFlags {
    /// Flags every label carries.
    pub const LABEL_BASE: Self = Self::CAN_SHOW_NAMETAG
        .union(Self::ALWAYS_SHOW_NAMETAG)
        .union(Self::IMMOBILE);
}

/// Three-component float vector as the client reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl WireVec3 {
    /// All-zero vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Build from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Item shown in the entity's hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldItem {
    /// Item id (0 is air).
    pub id: i16,
    /// Damage/meta value.
    pub meta: i16,
    /// Stack size.
    pub count: u8,
}

impl HeldItem {
    /// Empty hand.
    pub const AIR: Self = Self {
        id: 0,
        meta: 0,
        count: 0,
    };
}

/// Typed entity metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// 64-bit integer.
    Long(i64),
    /// UTF-8 string.
    String(String),
    /// 32-bit float.
    Float(f32),
}

impl MetadataValue {
    /// Wire type tag for this value.
    pub fn type_tag(&self) -> u8 {
        match self {
            MetadataValue::Long(_) => DATA_TYPE_LONG,
            MetadataValue::String(_) => DATA_TYPE_STRING,
            MetadataValue::Float(_) => DATA_TYPE_FLOAT,
        }
    }
}

/// Entity metadata keyed by `DATA_*` constants.
///
/// BTreeMap keeps the encoded order deterministic.
pub type EntityMetadata = BTreeMap<u32, MetadataValue>;

/// Creation (or full update) of a label entity on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLabelEntity {
    /// Client-side player UUID.
    pub uuid: [u8; 16],
    /// Player name (never displayed; the nametag overrides it).
    pub username: String,
    /// Legacy entity id field.
    pub eid: EntityId,
    /// Unique id field.
    pub entity_unique_id: EntityId,
    /// Runtime id field.
    pub entity_runtime_id: EntityId,
    /// Legacy X scalar.
    pub x: f32,
    /// Legacy Y scalar.
    pub y: f32,
    /// Legacy Z scalar.
    pub z: f32,
    /// Position vector (same values as the scalars).
    pub position: WireVec3,
    /// Always zero.
    pub motion: WireVec3,
    /// Always air.
    pub item: HeldItem,
    /// Flags, nametag, and scale.
    pub metadata: EntityMetadata,
}

impl AddLabelEntity {
    /// Nametag string, if present.
    pub fn nametag(&self) -> Option<&str> {
        match self.metadata.get(&DATA_NAMETAG) {
            Some(MetadataValue::String(tag)) => Some(tag),
            _ => None,
        }
    }

    /// Flag bitmask, if present.
    pub fn flags(&self) -> Option<EntityFlags> {
        match self.metadata.get(&DATA_FLAGS) {
            Some(MetadataValue::Long(bits)) => Some(EntityFlags::from_bits_retain(*bits)),
            _ => None,
        }
    }

    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.username.len() > MAX_USERNAME_LEN {
            return Err("Username too long");
        }
        if self.metadata.len() > MAX_METADATA_ENTRIES {
            return Err("Too many metadata entries");
        }
        for value in self.metadata.values() {
            if let MetadataValue::String(s) = value {
                if s.len() > MAX_NAMETAG_LEN {
                    return Err("Metadata string too long");
                }
            }
        }
        if self.eid != self.entity_unique_id || self.eid != self.entity_runtime_id {
            return Err("Identity fields disagree");
        }
        Ok(())
    }
}

/// Removal of a label entity from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLabelEntity {
    /// Legacy entity id field.
    pub eid: EntityId,
    /// Unique id field.
    pub entity_unique_id: EntityId,
    /// Runtime id field.
    pub entity_runtime_id: EntityId,
}

impl RemoveLabelEntity {
    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.eid != self.entity_unique_id || self.eid != self.entity_runtime_id {
            return Err("Identity fields disagree");
        }
        Ok(())
    }
}

/// Messages pushed from the server to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Create or fully refresh a label.
    AddEntity(AddLabelEntity),
    /// Drop a label.
    RemoveEntity(RemoveLabelEntity),
}

impl ServerMessage {
    /// Entity the message is about.
    pub fn entity_id(&self) -> EntityId {
        match self {
            ServerMessage::AddEntity(add) => add.eid,
            ServerMessage::RemoveEntity(remove) => remove.eid,
        }
    }

    /// Verify message limits and validity.
    ///
    /// Called on every decoded frame.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            ServerMessage::AddEntity(add) => add.verify(),
            ServerMessage::RemoveEntity(remove) => remove.verify(),
        }
    }
}
