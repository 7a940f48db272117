#![warn(missing_docs)]
//! Wire protocol and delivery plumbing for label entities.

mod codec;
mod protocol;
mod transport;
mod wire;

pub use codec::{
    compute_schema_hash, decode_server_message, encode_server_message, FRAME_HEADER_LEN,
};
pub use protocol::*;
pub use transport::{Outbox, OutboxTransport, SessionTransport};
pub use wire::{
    creation_message, entity_flags, label_uuid, nametag, removal_for, removal_message,
    round_to_tenth,
};
