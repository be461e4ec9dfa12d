//! # Sentinel Nav
//!
//! Navigation mesh support for NPC movement.
//!
//! This crate provides:
//! - Triangle nodes with height mapping and path classification
//! - Graph construction with shared-edge adjacency
//! - Cached point location and node-walking line of sight
//! - A* search weighted by per-node traversal cost
//! - Waypoint extraction with line-of-sight smoothing and density rules

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod astar;
pub mod graph;
pub mod node;
pub mod path;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::astar::*;
    pub use crate::graph::*;
    pub use crate::node::*;
    pub use crate::path::*;
}

pub use prelude::*;
