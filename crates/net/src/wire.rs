//! Label → wire message translation.
//!
//! Pure functions of label state: no persistence, no observers.

use crate::protocol::{
    AddLabelEntity, EntityFlags, EntityMetadata, HeldItem, MetadataValue, RemoveLabelEntity,
    WireVec3, DATA_FLAGS, DATA_NAMETAG, DATA_SCALE, LABEL_USERNAME, NAMETAG_RESET,
};
use texter_core::{EntityId, Label};

/// Round a coordinate to the wire's 0.1 block resolution.
pub fn round_to_tenth(value: f64) -> f32 {
    ((value * 10.0).round() / 10.0) as f32
}

/// Client-side UUID for a label entity.
///
/// Derived from the entity id so repeated creation messages agree.
pub fn label_uuid(entity_id: EntityId) -> [u8; 16] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"texter-label");
    hasher.update(&entity_id.to_le_bytes());
    let digest = hasher.finalize();

    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&digest.as_bytes()[..16]);
    // Version 4 / RFC 4122 variant bits so clients accept it.
    uuid[6] = (uuid[6] & 0x0f) | 0x40;
    uuid[8] = (uuid[8] & 0x3f) | 0x80;
    uuid
}

/// Nametag string: title, formatting reset, then body text on its own line.
pub fn nametag(title: &str, text: &str) -> String {
    let mut tag = String::with_capacity(title.len() + NAMETAG_RESET.len() + text.len() + 1);
    tag.push_str(title);
    tag.push_str(NAMETAG_RESET);
    if !text.is_empty() {
        tag.push('\n');
        tag.push_str(text);
    }
    tag
}

/// Flag bitmask for a label.
pub fn entity_flags(invisible: bool) -> EntityFlags {
    let mut flags = EntityFlags::LABEL_BASE;
    flags.set(EntityFlags::INVISIBLE, invisible);
    flags
}

/// Build the creation message for the label's current state.
pub fn creation_message(label: &Label) -> AddLabelEntity {
    let x = round_to_tenth(label.x());
    let y = round_to_tenth(label.y());
    let z = round_to_tenth(label.z());
    let entity_id = label.entity_id();

    let mut metadata = EntityMetadata::new();
    metadata.insert(
        DATA_FLAGS,
        MetadataValue::Long(entity_flags(label.is_invisible()).bits()),
    );
    metadata.insert(
        DATA_NAMETAG,
        MetadataValue::String(nametag(label.title(), label.text())),
    );
    metadata.insert(DATA_SCALE, MetadataValue::Float(0.0));

    AddLabelEntity {
        uuid: label_uuid(entity_id),
        username: LABEL_USERNAME.to_string(),
        eid: entity_id,
        entity_unique_id: entity_id,
        entity_runtime_id: entity_id,
        x,
        y,
        z,
        position: WireVec3::new(x, y, z),
        motion: WireVec3::ZERO,
        item: HeldItem::AIR,
        metadata,
    }
}

/// Build the removal message for the label.
pub fn removal_message(label: &Label) -> RemoveLabelEntity {
    removal_for(label.entity_id())
}

/// Removal message for a bare entity id.
pub fn removal_for(entity_id: EntityId) -> RemoveLabelEntity {
    RemoveLabelEntity {
        eid: entity_id,
        entity_unique_id: entity_id,
        entity_runtime_id: entity_id,
    }
}
