#![warn(missing_docs)]
//! Label host: synchronization, sessions, and the live label registry.

mod book;
mod handle;
mod policy;
mod sessions;
mod sync;

pub use book::LabelBook;
pub use handle::LabelHandle;
pub use policy::{default_failure_policy, FailurePolicy, SyncPolicy};
pub use sessions::WorldSessions;
pub use sync::{CommitOutcome, PendingChange, SendType, Synchronizer};
