//! Errors raised while configuring or building a kd-tree.

use thiserror::Error;

/// Errors that can occur while assembling or building a kd-tree.
///
/// All of these are caller errors detected before or during `build()`;
/// traversal itself has no failure modes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KdTreeError {
    #[error("kd-tree has already been built")]
    AlreadyBuilt,

    #[error("shape {shape} contributes no primitives")]
    EmptyShape { shape: usize },

    #[error("shape {shape} has a degenerate bounding box (inverted, NaN or infinite)")]
    DegenerateBounds { shape: usize },

    #[error("{what} count {count} exceeds the supported limit of {limit}")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("invalid kd-tree configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

/// Result type for kd-tree operations.
pub type KdTreeResult<T> = Result<T, KdTreeError>;
