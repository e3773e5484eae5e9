//! Error types for the BER crate.

use telesim_common::Cancelled;
use telesim_phy::PhyError;
use thiserror::Error;

/// Errors raised while running a Monte-Carlo experiment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BerError {
    /// Modulation, channel or receiver failure.
    #[error(transparent)]
    Phy(#[from] PhyError),

    /// The run was stopped through its cancel token.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// An experiment parameter was out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
