use std::collections::BTreeMap;

use texter_core::EntityId;

use crate::{LabelRecord, LabelStore, StoreError};

/// Store that keeps records in memory only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<EntityId, LabelRecord>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `entity_id`, if stored.
    pub fn get(&self, entity_id: EntityId) -> Option<&LabelRecord> {
        self.records.get(&entity_id)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LabelStore for MemoryStore {
    fn insert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        match self.records.get(&record.entity_id) {
            Some(existing) if existing != record => Err(StoreError::Duplicate(record.entity_id)),
            _ => {
                self.records.insert(record.entity_id, record.clone());
                Ok(())
            }
        }
    }

    fn upsert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        self.records.insert(record.entity_id, record.clone());
        Ok(())
    }

    fn delete(&mut self, entity_id: EntityId) -> Result<(), StoreError> {
        self.records.remove(&entity_id);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<LabelRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }
}
