//! Session delivery.
//!
//! The synchronizer hands finished messages to a [`SessionTransport`] and
//! never looks at the outcome. [`OutboxTransport`] is the in-process adapter:
//! each session gets an unbounded channel of encoded frames that a network
//! task (or a test) drains.

use crate::codec::encode_server_message;
use crate::protocol::ServerMessage;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use texter_core::SessionId;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// One-way delivery of messages to sessions.
pub trait SessionTransport {
    /// Push `message` to `session`. Failures are the transport's problem.
    fn deliver(&self, session: SessionId, message: &ServerMessage);
}

impl<T: SessionTransport + ?Sized> SessionTransport for &T {
    fn deliver(&self, session: SessionId, message: &ServerMessage) {
        (**self).deliver(session, message);
    }
}

impl<T: SessionTransport + ?Sized> SessionTransport for Arc<T> {
    fn deliver(&self, session: SessionId, message: &ServerMessage) {
        (**self).deliver(session, message);
    }
}

/// Receiving end of a session outbox.
pub type Outbox = mpsc::UnboundedReceiver<Vec<u8>>;

/// Transport that frames messages into per-session channels.
#[derive(Debug, Default)]
pub struct OutboxTransport {
    sessions: Mutex<BTreeMap<SessionId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl OutboxTransport {
    /// Create a transport with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) the outbox for `session`.
    pub fn open(&self, session: SessionId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session, tx);
        }
        rx
    }

    /// Close the outbox for `session`; pending frames stay readable.
    pub fn close(&self, session: SessionId) -> bool {
        self.sessions
            .lock()
            .map(|mut sessions| sessions.remove(&session).is_some())
            .unwrap_or(false)
    }

    /// Number of open outboxes.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl SessionTransport for OutboxTransport {
    fn deliver(&self, session: SessionId, message: &ServerMessage) {
        let frame = match encode_server_message(message) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%session, "Failed to encode message: {err:#}");
                return;
            }
        };

        let Ok(mut sessions) = self.sessions.lock() else {
            warn!(%session, "Outbox registry poisoned; dropping frame");
            return;
        };
        let Some(tx) = sessions.get(&session) else {
            warn!(%session, "No outbox for session; dropping frame");
            return;
        };
        if tx.send(frame).is_err() {
            warn!(%session, "Session outbox closed; forgetting session");
            sessions.remove(&session);
            return;
        }
        trace!(%session, entity_id = message.entity_id(), "Queued frame");
    }
}
