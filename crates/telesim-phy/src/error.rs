//! Error types for the PHY crate.

use thiserror::Error;

/// Errors raised by the modulation, channel and receiver building blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhyError {
    /// The modulation tag is not one of the supported QPSK/QAM forms.
    #[error("Unsupported modulation: {0}")]
    UnsupportedModulation(String),

    /// QAM order is not a perfect square.
    #[error("QAM order {0} is not a perfect square (expected 4, 16, 64, 256, ...)")]
    NonSquareOrder(u32),

    /// Antenna counts must both be at least one.
    #[error("Invalid antenna configuration {nt}x{nr}: counts must be positive")]
    InvalidAntennaConfig {
        /// Transmit antennas.
        nt: i64,
        /// Receive antennas.
        nr: i64,
    },

    /// Channel kind is not recognised, or cannot serve the antenna layout.
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),

    /// A tensor did not have the length implied by the configured dimensions.
    #[error("Shape mismatch for {what}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Which buffer was malformed.
        what: &'static str,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// A bit buffer contained something other than 0 or 1.
    #[error("Invalid bit value {0}")]
    InvalidBit(u8),

    /// A numeric parameter was out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The numeric backend could not be used.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}
