//! Error types for Sentinel.
//!
//! Only load-time operations return these. The per-tick decision loop reports
//! misses through `Option`/`bool` and never fails.

use crate::ids::NpcTypeId;
use thiserror::Error;

/// Top-level error type for Sentinel operations.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Navigation mesh errors
    #[error("Navigation error: {0}")]
    Nav(#[from] NavError),

    /// Content data errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Navigation mesh construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    /// The mesh had no usable faces
    #[error("Navigation mesh has no faces")]
    EmptyMesh,

    /// A face referenced a vertex index past the vertex array
    #[error("Face {face} references vertex {index} but only {count} vertices exist")]
    VertexOutOfRange {
        /// Face index
        face: usize,
        /// Offending vertex index
        index: u32,
        /// Number of vertices
        count: usize,
    },

    /// A face repeats a vertex index
    #[error("Face {face} is degenerate (duplicate vertex)")]
    DegenerateFace {
        /// Face index
        face: usize,
    },
}

/// NPC content data errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    /// Failed to parse content data
    #[error("Failed to parse content: {0}")]
    Parse(String),

    /// NPC type was requested but not present in the catalog
    #[error("Unknown NPC type {0:?}")]
    MissingNpc(NpcTypeId),

    /// A tier table is empty
    #[error("Tier table '{0}' is empty")]
    EmptyTierTable(&'static str),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Failed to serialize configuration
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Result type alias for Sentinel operations.
pub type SentinelResult<T> = Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_error_converts() {
        let err: SentinelError = NavError::DegenerateFace { face: 3 }.into();
        assert!(matches!(err, SentinelError::Nav(NavError::DegenerateFace { face: 3 })));
        assert_eq!(err.to_string(), "Navigation error: Face 3 is degenerate (duplicate vertex)");
    }

    #[test]
    fn test_missing_npc_message() {
        let err = ContentError::MissingNpc(NpcTypeId::new(7));
        assert!(err.to_string().contains("Unknown NPC type"));
    }
}
