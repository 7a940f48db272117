#![warn(missing_docs)]
//! Core label types shared across the workspace.

pub mod coord;
mod error;
pub mod identity;
pub mod label;
pub mod world;

pub use coord::ToCoordinate;
pub use error::LabelError;
pub use glam::DVec3;
pub use identity::{EntityId, IdentityAllocator, LocalEntityCounter, ProcessEntityCounter};
pub use label::{translate_newlines, Field, Label, Lifecycle, Mutation, NEWLINE_MARKER};
pub use world::{ObserverRegistry, SessionId, WorldId, WorldRef, WorldResolver};
