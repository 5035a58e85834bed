//! Error types for the file layer.

use thiserror::Error;

/// Errors from the file layer.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// A delta points outside the buffer it applies to.
    #[error("delta at offset {offset} (delete {delete}) out of bounds for buffer of {len}")]
    DeltaOutOfBounds { offset: u64, delete: u64, len: usize },

    /// The edit-script search exhausted its budget schedule.
    #[error("difference search exhausted its budget")]
    DiffBudgetExhausted,

    /// No meta record matches the file identifier.
    #[error("unknown file {0}")]
    UnknownFile(String),

    /// Node-level failure.
    #[error(transparent)]
    Node(#[from] quilt_node::NodeError),

    /// Core-level failure.
    #[error(transparent)]
    Core(#[from] quilt_core::CoreError),
}

/// Result type for file-layer operations.
pub type Result<T> = std::result::Result<T, SpaceError>;
