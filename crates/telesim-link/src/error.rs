//! Error types for the propagation crate.

use telesim_common::Cancelled;
use thiserror::Error;

/// Errors raised while building radio maps.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// Grid resolution or area extent is unusable.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// A propagation parameter is out of range.
    #[error("Invalid propagation parameter: {0}")]
    InvalidParameter(String),

    /// The emitter list is empty or malformed.
    #[error("Invalid emitter list: {0}")]
    InvalidEmitters(String),

    /// Unknown combine mode.
    #[error("Unknown combine mode '{0}' (expected \"max\" or \"sum\")")]
    UnknownCombineMode(String),

    /// Grids being combined do not share one shape.
    #[error("Grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the first grid (rows, cols).
        expected: (usize, usize),
        /// Offending shape.
        actual: (usize, usize),
    },

    /// The run was stopped through its cancel token.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
