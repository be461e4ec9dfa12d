//! # Sentinel AI
//!
//! Decision making and movement for non-player characters.
//!
//! This crate provides:
//! - Animation and behavior state machines with static transition tables
//! - The per-NPC brain: targeting, path rebuilds, attacks and stuck recovery
//! - Actor locomotion physics, including blast and dagger knockback
//! - A bounded task queue the brain drives the actor through
//! - NPC content data (RON) and engine configuration (TOML)
//! - World-query traits and an event bus towards the session layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod actor;
pub mod animation;
pub mod behavior;
pub mod brain;
pub mod config;
pub mod events;
pub mod locomotion;
pub mod manager;
pub mod npc;
pub mod skills;
pub mod task;
pub mod timer;
pub mod world;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actor::*;
    pub use crate::animation::*;
    pub use crate::behavior::*;
    pub use crate::brain::*;
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::locomotion::*;
    pub use crate::manager::*;
    pub use crate::npc::*;
    pub use crate::skills::*;
    pub use crate::task::*;
    pub use crate::timer::*;
    pub use crate::world::*;
}

pub use prelude::*;
