use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use texter_core::{EntityId, SessionId};
use texter_net::{ServerMessage, SessionTransport};
use texter_store::{LabelRecord, LabelStore, MemoryStore, StoreError};

/// Store operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    /// Initial insert.
    Insert,
    /// Insert-or-replace.
    Upsert,
    /// Record removal.
    Delete,
}

/// One observed side effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A store call and whether it succeeded.
    Stored {
        /// Operation attempted.
        op: StoreOp,
        /// Record key.
        entity_id: EntityId,
        /// Whether the store accepted it.
        ok: bool,
    },
    /// A message handed to the transport.
    Delivered {
        /// Target session.
        session: SessionId,
        /// Message as delivered.
        message: ServerMessage,
    },
}

/// Shared, ordered record of store calls and deliveries.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that records into this journal.
    pub fn transport(&self) -> RecordingTransport {
        RecordingTransport {
            journal: self.clone(),
        }
    }

    /// Memory-backed store that records into this journal.
    pub fn store(&self) -> FlakyStore {
        FlakyStore {
            inner: MemoryStore::new(),
            journal: self.clone(),
            fail_writes: false,
            fail_deletes: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, entry: JournalEntry) {
        self.lock().push(entry);
    }

    /// Snapshot of every entry so far.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Deliveries in order.
    pub fn deliveries(&self) -> Vec<(SessionId, ServerMessage)> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Delivered { session, message } => Some((*session, message.clone())),
                JournalEntry::Stored { .. } => None,
            })
            .collect()
    }

    /// Store calls in order.
    pub fn store_ops(&self) -> Vec<(StoreOp, EntityId, bool)> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Stored { op, entity_id, ok } => Some((*op, *entity_id, *ok)),
                JournalEntry::Delivered { .. } => None,
            })
            .collect()
    }

    /// Messages delivered to `session`, in order.
    pub fn delivered_to(&self, session: SessionId) -> Vec<ServerMessage> {
        self.deliveries()
            .into_iter()
            .filter(|(target, _)| *target == session)
            .map(|(_, message)| message)
            .collect()
    }

    /// Number of creation messages delivered.
    pub fn add_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|(_, message)| is_add(message))
            .count()
    }

    /// Number of removal messages delivered.
    pub fn remove_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|(_, message)| !is_add(message))
            .count()
    }
}

/// Whether `message` is a creation message.
pub fn is_add(message: &ServerMessage) -> bool {
    matches!(message, ServerMessage::AddEntity(_))
}

/// Transport that only records.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    journal: Journal,
}

impl SessionTransport for RecordingTransport {
    fn deliver(&self, session: SessionId, message: &ServerMessage) {
        self.journal.push(JournalEntry::Delivered {
            session,
            message: message.clone(),
        });
    }
}

/// In-memory store whose writes can be made to fail.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    journal: Journal,
    fail_writes: bool,
    fail_deletes: bool,
}

impl FlakyStore {
    /// Make inserts and upserts fail (or succeed again).
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make deletes fail (or succeed again).
    pub fn fail_deletes(&mut self, fail: bool) {
        self.fail_deletes = fail;
    }

    /// Records that made it into the store.
    pub fn records(&self) -> &MemoryStore {
        &self.inner
    }

    fn record(&self, op: StoreOp, entity_id: EntityId, ok: bool) {
        self.journal.push(JournalEntry::Stored { op, entity_id, ok });
    }

    fn write(
        &mut self,
        op: StoreOp,
        record: &LabelRecord,
        apply: impl FnOnce(&mut MemoryStore, &LabelRecord) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        if self.fail_writes {
            self.record(op, record.entity_id, false);
            return Err(StoreError::Rejected("injected write failure".into()));
        }
        let result = apply(&mut self.inner, record);
        self.record(op, record.entity_id, result.is_ok());
        result
    }
}

impl LabelStore for FlakyStore {
    fn insert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        self.write(StoreOp::Insert, record, |store, record| store.insert(record))
    }

    fn upsert(&mut self, record: &LabelRecord) -> Result<(), StoreError> {
        self.write(StoreOp::Upsert, record, |store, record| store.upsert(record))
    }

    fn delete(&mut self, entity_id: EntityId) -> Result<(), StoreError> {
        if self.fail_deletes {
            self.record(StoreOp::Delete, entity_id, false);
            return Err(StoreError::Rejected("injected delete failure".into()));
        }
        let result = self.inner.delete(entity_id);
        self.record(StoreOp::Delete, entity_id, result.is_ok());
        result
    }

    fn load_all(&self) -> Result<Vec<LabelRecord>, StoreError> {
        self.inner.load_all()
    }
}
