//! Mutate → persist → broadcast → rollback.
//!
//! Every label change goes through [`Synchronizer::stage`] and
//! [`Synchronizer::commit`]. A change is written in memory, persisted, and
//! only then announced to the observers of the label's world. World and
//! entity-id changes first remove the label from the old observers so no
//! client ever holds two copies.

use std::sync::Arc;

use texter_core::{
    DVec3, IdentityAllocator, Label, LabelError, Lifecycle, Mutation, ObserverRegistry,
    SessionId, WorldRef, WorldResolver,
};
use texter_net::{
    creation_message, nametag, removal_message, ServerMessage, SessionTransport, MAX_NAMETAG_LEN,
};
use texter_store::{LabelRecord, LabelStore};
use tracing::{debug, info, instrument, warn};

use crate::handle::LabelHandle;
use crate::policy::{FailurePolicy, SyncPolicy};

/// Broadcast operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendType {
    /// Create or refresh the label on clients.
    Add,
    /// Delete the stored record and drop the label from clients.
    Remove,
}

impl SendType {
    /// Numeric code used by callers that pass raw operation codes.
    pub const fn code(self) -> u8 {
        match self {
            SendType::Add => 0,
            SendType::Remove => 1,
        }
    }

    /// Inverse of [`SendType::code`].
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SendType::Add),
            1 => Some(SendType::Remove),
            _ => None,
        }
    }
}

/// A validated change waiting to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    mutation: Mutation,
    policy: FailurePolicy,
}

impl PendingChange {
    /// The normalized mutation that will be applied.
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Failure policy captured at staging time.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Result of committing a change.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Persisted and broadcast.
    Committed,
    /// Persistence failed; the previous value is back in place.
    RolledBack(LabelError),
    /// Persistence failed; the new value was kept in memory regardless.
    Unpersisted(LabelError),
}

impl CommitOutcome {
    /// Whether the change reached storage.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// Orchestrates label persistence and observer broadcasts.
pub struct Synchronizer<S, O, T> {
    store: S,
    observers: O,
    transport: T,
    ids: Arc<dyn IdentityAllocator>,
    policy: SyncPolicy,
}

impl<S, O, T> Synchronizer<S, O, T>
where
    S: LabelStore,
    O: ObserverRegistry,
    T: SessionTransport,
{
    /// Wire up collaborators with the default policy.
    pub fn new(store: S, observers: O, transport: T, ids: Arc<dyn IdentityAllocator>) -> Self {
        Self {
            store,
            observers,
            transport,
            ids,
            policy: SyncPolicy::default(),
        }
    }

    /// Replace the synchronization policy.
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active policy.
    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Persistence gateway.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable persistence gateway.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Observer registry.
    pub fn observers(&self) -> &O {
        &self.observers
    }

    /// Mutable observer registry.
    pub fn observers_mut(&mut self) -> &mut O {
        &mut self.observers
    }

    /// Session transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Identity allocator.
    pub fn ids(&self) -> &dyn IdentityAllocator {
        self.ids.as_ref()
    }

    /// Create a label, persist it, and announce it to its world.
    ///
    /// When the initial insert fails the label is still returned, flagged
    /// `failed`, and nobody hears about it. Title and text too long for a
    /// nametag fail the same way without touching storage.
    #[instrument(skip(self, world, title, text), fields(world = %world))]
    pub fn create(&mut self, world: WorldRef, position: DVec3, title: &str, text: &str) -> Label {
        let entity_id = self.ids.next_entity_id();
        let mut label = Label::new(world, position, title, text, entity_id);

        if !fits_nametag(label.title(), label.text()) {
            label.set_failed(true);
            label.set_lifecycle(Lifecycle::Failed);
            warn!(entity_id, "New label does not fit in a nametag; not persisting");
            return label;
        }

        match self.store.insert(&LabelRecord::from_label(&label)) {
            Ok(()) => {
                label.set_lifecycle(Lifecycle::Active);
                info!(entity_id, "Created label");
                self.send_to_world(&label, SendType::Add);
            }
            Err(err) => {
                label.set_failed(true);
                label.set_lifecycle(Lifecycle::Failed);
                warn!(entity_id, "Failed to persist new label: {err}");
            }
        }
        label
    }

    /// Borrow a label together with this synchronizer for chained setters.
    pub fn bind<'a>(&'a mut self, label: &'a mut Label) -> LabelHandle<'a, S, O, T> {
        LabelHandle::new(self, label)
    }

    /// Validate and normalize a mutation without touching anything.
    ///
    /// Rejects non-finite coordinates and title or text that would overflow
    /// the nametag.
    pub fn stage(&self, label: &Label, mutation: Mutation) -> Result<PendingChange, LabelError> {
        if label.lifecycle() == Lifecycle::Removed {
            return Err(LabelError::Removed(label.entity_id()));
        }

        let mutation = mutation.normalized();
        let accepted = match &mutation {
            Mutation::X(v) | Mutation::Y(v) | Mutation::Z(v) => v.is_finite(),
            Mutation::Position(pos) => pos.is_finite(),
            Mutation::Title(title) => fits_nametag(title, label.text()),
            Mutation::Text(text) => fits_nametag(label.title(), text),
            _ => true,
        };
        if !accepted {
            return Err(LabelError::ValidationRejected {
                field: mutation.field().as_str(),
            });
        }

        Ok(PendingChange {
            policy: self.policy.failure_policy(mutation.field()),
            mutation,
        })
    }

    /// Apply a staged change, persist it, and broadcast the result.
    #[instrument(skip(self, label, change), fields(entity_id = label.entity_id(), field = change.mutation.field().as_str()))]
    pub fn commit(&mut self, label: &mut Label, change: PendingChange) -> CommitOutcome {
        let PendingChange { mutation, policy } = change;
        match mutation {
            Mutation::World(_) | Mutation::EntityId(_) => {
                self.commit_relocation(label, mutation, policy)
            }
            mutation => self.commit_in_place(label, mutation, policy),
        }
    }

    /// Stage and commit in one step.
    pub fn mutate(
        &mut self,
        label: &mut Label,
        mutation: Mutation,
    ) -> Result<CommitOutcome, LabelError> {
        let change = self.stage(label, mutation)?;
        Ok(self.commit(label, change))
    }

    /// Move a label to the world called `name`.
    ///
    /// An unknown name changes nothing but still re-sends the label to its
    /// current world.
    pub fn relocate_by_name(
        &mut self,
        label: &mut Label,
        name: &str,
    ) -> Result<CommitOutcome, LabelError>
    where
        O: WorldResolver,
    {
        match self.observers.world_by_name(name) {
            Some(world) => self.mutate(label, Mutation::World(world)),
            None => {
                debug!(entity_id = label.entity_id(), name, "World name did not resolve");
                self.announce(label);
                Err(LabelError::UnresolvedWorldReference(name.to_string()))
            }
        }
    }

    /// Delete the label's record and drop it from every observer.
    #[instrument(skip(self, label), fields(entity_id = label.entity_id()))]
    pub fn remove(&mut self, label: &mut Label) -> bool {
        let deleted = self.send_to_world(label, SendType::Remove);
        label.set_lifecycle(Lifecycle::Removed);
        info!(deleted, "Removed label");
        deleted
    }

    /// Deliver `kind` for `label` to every session in `targets`.
    ///
    /// `Remove` deletes the stored record before anything is delivered and
    /// returns `false` when that delete fails (messages still go out).
    pub fn send(&mut self, label: &Label, kind: SendType, targets: &[SessionId]) -> bool {
        let (message, ok) = match kind {
            SendType::Add => (ServerMessage::AddEntity(creation_message(label)), true),
            SendType::Remove => {
                let ok = match self.store.delete(label.entity_id()) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(entity_id = label.entity_id(), "Failed to delete label record: {err}");
                        false
                    }
                };
                (ServerMessage::RemoveEntity(removal_message(label)), ok)
            }
        };

        for session in targets {
            self.transport.deliver(*session, &message);
        }
        debug!(
            entity_id = label.entity_id(),
            kind = ?kind,
            sessions = targets.len(),
            "Broadcast label"
        );
        ok
    }

    /// [`Self::send`] with a raw operation code. Unknown codes deliver nothing.
    pub fn send_code(&mut self, label: &Label, code: u8, targets: &[SessionId]) -> bool {
        match SendType::from_code(code) {
            Some(kind) => self.send(label, kind, targets),
            None => {
                warn!(
                    entity_id = label.entity_id(),
                    "{}",
                    LabelError::UnknownBroadcastType(code)
                );
                false
            }
        }
    }

    /// [`Self::send`] to everyone currently viewing the label's world.
    pub fn send_to_world(&mut self, label: &Label, kind: SendType) -> bool {
        let targets = self.observers.observers_of(label.world().id());
        self.send(label, kind, &targets)
    }

    /// Deliver `kind` to one session. Never touches storage.
    pub fn send_to_session(&self, label: &Label, kind: SendType, session: SessionId) {
        let message = match kind {
            SendType::Add => ServerMessage::AddEntity(creation_message(label)),
            SendType::Remove => ServerMessage::RemoveEntity(removal_message(label)),
        };
        self.transport.deliver(session, &message);
    }

    fn persist(&mut self, label: &Label) -> Result<(), LabelError> {
        self.store
            .upsert(&LabelRecord::from_label(label))
            .map_err(|err| LabelError::PersistenceFailure {
                entity_id: label.entity_id(),
                reason: err.to_string(),
            })
    }

    /// Broadcast the creation message unless the label never made it to storage.
    fn announce(&mut self, label: &Label) {
        if label.lifecycle() == Lifecycle::Failed {
            debug!(entity_id = label.entity_id(), "Not announcing failed label");
            return;
        }
        self.send_to_world(label, SendType::Add);
    }

    fn commit_in_place(
        &mut self,
        label: &mut Label,
        mutation: Mutation,
        policy: FailurePolicy,
    ) -> CommitOutcome {
        let previous = label.apply(mutation);

        match self.persist(label) {
            Ok(()) => {
                label.set_lifecycle(Lifecycle::Active);
                self.announce(label);
                CommitOutcome::Committed
            }
            Err(err) => match policy {
                FailurePolicy::Rollback => {
                    label.apply(previous);
                    warn!("Rolled back label change: {err}");
                    CommitOutcome::RolledBack(err)
                }
                FailurePolicy::BestEffort => {
                    warn!("Keeping unpersisted label change: {err}");
                    self.announce(label);
                    CommitOutcome::Unpersisted(err)
                }
            },
        }
    }

    /// World and entity-id changes: remove under the old identity, apply,
    /// persist, then announce under whatever identity survived.
    fn commit_relocation(
        &mut self,
        label: &mut Label,
        mutation: Mutation,
        policy: FailurePolicy,
    ) -> CommitOutcome {
        let was_active = label.lifecycle() == Lifecycle::Active;
        if was_active {
            self.send_to_world(label, SendType::Remove);
            label.set_lifecycle(Lifecycle::Removed);
        } else {
            // Nobody was told about it, but a stale record may still exist.
            self.send(label, SendType::Remove, &[]);
        }

        let previous = label.apply(mutation);
        let outcome = match self.persist(label) {
            Ok(()) => {
                label.set_lifecycle(Lifecycle::Active);
                CommitOutcome::Committed
            }
            Err(err) => match policy {
                FailurePolicy::Rollback => {
                    label.apply(previous);
                    warn!("Rolled back label relocation: {err}");
                    CommitOutcome::RolledBack(err)
                }
                FailurePolicy::BestEffort => {
                    warn!("Keeping unpersisted label relocation: {err}");
                    CommitOutcome::Unpersisted(err)
                }
            },
        };

        if matches!(outcome, CommitOutcome::RolledBack(_))
            && !self.policy.rebroadcast_after_world_rollback
        {
            // Record already deleted and clients already told; the label stays removed.
            debug!("Suppressing re-broadcast after rolled-back relocation");
            return outcome;
        }

        if label.lifecycle() == Lifecycle::Removed {
            label.set_lifecycle(Lifecycle::Active);
        }
        self.announce(label);
        outcome
    }
}

fn fits_nametag(title: &str, text: &str) -> bool {
    nametag(title, text).len() <= MAX_NAMETAG_LEN
}
