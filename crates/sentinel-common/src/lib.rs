//! # Sentinel Common
//!
//! Common types, utilities, and shared abstractions for the Sentinel NPC runtime.
//!
//! This crate provides foundational types used across all Sentinel subsystems:
//! - ID types (ObjectId, NodeId, SkillId, NpcTypeId)
//! - Planar geometry helpers on top of `glam`
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
    pub use glam::{Vec2, Vec3};
}

pub use prelude::*;
