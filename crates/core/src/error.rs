use thiserror::Error;

use crate::identity::EntityId;

/// Ways a label operation can fail to take effect.
///
/// Chained setters swallow these (the value simply stays unchanged); the
/// two-phase `stage`/`commit` API hands them back to callers that care.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    /// A value was not acceptable for its field: a non-finite coordinate, or
    /// text too long for the nametag.
    #[error("rejected value for {field}")]
    ValidationRejected {
        /// Field the value was meant for.
        field: &'static str,
    },
    /// The persistence gateway refused the write.
    #[error("failed to persist label {entity_id}: {reason}")]
    PersistenceFailure {
        /// Label that could not be persisted.
        entity_id: EntityId,
        /// Gateway error message.
        reason: String,
    },
    /// A world name did not match any loaded world.
    #[error("no loaded world named {0:?}")]
    UnresolvedWorldReference(String),
    /// `send` received a type code other than add/remove.
    #[error("unknown broadcast type code {0}")]
    UnknownBroadcastType(u8),
    /// Another live label already uses this entity id.
    #[error("entity id {0} is already in use")]
    EntityIdTaken(EntityId),
    /// The label was already removed.
    #[error("label {0} has been removed")]
    Removed(EntityId),
}
