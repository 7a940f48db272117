#![warn(missing_docs)]
//! Durable label storage.
//!
//! The synchronizer only sees the [`LabelStore`] contract: insert, upsert,
//! and delete whole records, any of which may fail. Two backends ship here:
//! [`MemoryStore`] for ephemeral hosts and [`FileStore`] for a single
//! checksummed label file.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use texter_core::{DVec3, EntityId, Label, Lifecycle, WorldRef};
use thiserror::Error;

/// Errors raised by label storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("label store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Record (de)serialization failure.
    #[error("failed to encode label records: {0}")]
    Encode(#[from] bincode::Error),
    /// The label file failed validation.
    #[error("label file is corrupt: {0}")]
    Corrupt(String),
    /// A different record already uses this entity id.
    #[error("label {0} already exists")]
    Duplicate(EntityId),
    /// The backend refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Persisted form of a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Wire identity, also the storage key.
    pub entity_id: EntityId,
    /// World name.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Title with line breaks already translated.
    pub title: String,
    /// Body text with line breaks already translated.
    pub text: String,
    /// Invisibility flag.
    pub invisible: bool,
}

impl LabelRecord {
    /// Snapshot of the label's persisted fields.
    pub fn from_label(label: &Label) -> Self {
        Self {
            entity_id: label.entity_id(),
            world: label.world().name().to_string(),
            x: label.x(),
            y: label.y(),
            z: label.z(),
            title: label.title().to_string(),
            text: label.text().to_string(),
            invisible: label.is_invisible(),
        }
    }

    /// Rebuild an active label in `world` (already resolved from [`Self::world`]).
    pub fn into_label(self, world: WorldRef) -> Label {
        let mut label = Label::new(
            world,
            DVec3::new(self.x, self.y, self.z),
            &self.title,
            &self.text,
            self.entity_id,
        );
        label.apply(texter_core::Mutation::Invisible(self.invisible));
        label.set_lifecycle(Lifecycle::Active);
        label
    }
}

/// Persistence gateway used by the synchronizer.
///
/// Every operation is idempotent under retry.
pub trait LabelStore {
    /// Store a new record. Re-inserting an identical record succeeds.
    fn insert(&mut self, record: &LabelRecord) -> Result<(), StoreError>;

    /// Store or replace the record keyed by its entity id.
    fn upsert(&mut self, record: &LabelRecord) -> Result<(), StoreError>;

    /// Drop the record for `entity_id`. Missing records are not an error.
    fn delete(&mut self, entity_id: EntityId) -> Result<(), StoreError>;

    /// Every stored record, ordered by entity id.
    fn load_all(&self) -> Result<Vec<LabelRecord>, StoreError>;
}

impl<S: LabelStore + ?Sized> LabelStore for Box<S> {
    fn insert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        (**self).insert(record)
    }

    fn upsert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        (**self).upsert(record)
    }

    fn delete(&mut self, entity_id: EntityId) -> Result<(), StoreError> {
        (**self).delete(entity_id)
    }

    fn load_all(&self) -> Result<Vec<LabelRecord>, StoreError> {
        (**self).load_all()
    }
}
