//! Message framing.
//!
//! Frame format: `[length: u32 LE][message_type: u8][postcard payload]`, where
//! the length counts the type byte and the payload.

use crate::protocol::{ServerMessage, PROTOCOL_VERSION};
use anyhow::{Context, Result};

/// Frame header size: length prefix plus type tag.
pub const FRAME_HEADER_LEN: usize = 5;

/// Compute schema hash from protocol definitions.
///
/// Lets a client refuse frames from an incompatible host build.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(b"ServerMessage");
    hasher.update(b"AddLabelEntity");
    hasher.update(b"RemoveLabelEntity");

    let hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Encode a server message with length prefix.
///
/// Messages that would fail [`ServerMessage::verify`] on the receiving side
/// are refused here.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>> {
    msg.verify()
        .map_err(|reason| anyhow::anyhow!(reason))
        .context("Refusing to encode invalid server message")?;
    let payload = postcard::to_allocvec(msg).context("Failed to serialize server message")?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    let length = u32::try_from(1 + payload.len()).context("Server message too large")?;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(message_type_tag(msg));
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Decode a server message from frame data.
///
/// Expects data to start with the length prefix. The decoded message must
/// pass [`ServerMessage::verify`].
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage> {
    if data.len() < FRAME_HEADER_LEN {
        anyhow::bail!(
            "Frame too short: {} bytes (minimum {})",
            data.len(),
            FRAME_HEADER_LEN
        );
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length == 0 || data.len() - 4 < length {
        anyhow::bail!(
            "Incomplete frame: expected {} bytes, got {}",
            length.saturating_add(4),
            data.len()
        );
    }

    let tag = data[4];
    let payload = &data[FRAME_HEADER_LEN..4 + length];
    let msg: ServerMessage =
        postcard::from_bytes(payload).context("Failed to deserialize server message")?;

    if message_type_tag(&msg) != tag {
        anyhow::bail!("Frame tag {} does not match payload", tag);
    }
    msg.verify().map_err(|reason| anyhow::anyhow!(reason))?;

    Ok(msg)
}

fn message_type_tag(msg: &ServerMessage) -> u8 {
    match msg {
        ServerMessage::AddEntity(_) => 0,
        ServerMessage::RemoveEntity(_) => 1,
    }
}
