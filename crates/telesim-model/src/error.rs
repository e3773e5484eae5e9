//! Error types for request loading and validation.

use std::path::PathBuf;
use telesim_link::LinkError;
use telesim_phy::PhyError;
use thiserror::Error;

/// Errors raised while loading or validating requests.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O error reading a request file.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither YAML nor JSON.
    #[error("Unsupported request file format: {0}")]
    UnsupportedFormat(String),

    /// Modulation, channel or antenna parameters are invalid.
    #[error(transparent)]
    Phy(#[from] PhyError),

    /// Propagation parameters are invalid.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Any other out-of-range field.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
