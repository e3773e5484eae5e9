//! The capability interface between estimators and the numeric backend.
//!
//! Estimators and combiners only ever ask a backend for two things: turn bits
//! into symbols, and push symbols through the channel. Everything else about
//! the backend stays behind this trait.

use crate::{Channel, ChannelOutput, Constellation, PhyError};
use num_complex::Complex64;
use rand::RngCore;

/// Numeric backend used by the Monte-Carlo estimators.
///
/// A backend whose runtime or device is missing reports
/// [`PhyError::BackendUnavailable`]; the failure reaches the caller as a
/// `dependency` error. [`NativeBackend`] is pure Rust and never raises it.
pub trait PhyBackend {
    /// Map a flat buffer of k-bit groups to one symbol per group.
    fn map_bits_to_symbols(&self, bits: &[u8]) -> Result<Vec<Complex64>, PhyError>;

    /// Pass a `[B x nt]` batch through the channel at the given noise variance.
    fn apply_channel(
        &self,
        rng: &mut dyn RngCore,
        tx: &[Complex64],
        noise_variance: f64,
    ) -> Result<ChannelOutput, PhyError>;
}

/// Pure-Rust backend built from a [`Constellation`] and a [`Channel`].
#[derive(Debug, Clone)]
pub struct NativeBackend {
    constellation: Constellation,
    channel: Channel,
}

impl NativeBackend {
    /// Create a backend.
    pub fn new(constellation: Constellation, channel: Channel) -> Self {
        Self {
            constellation,
            channel,
        }
    }

    /// The constellation used for mapping.
    pub fn constellation(&self) -> &Constellation {
        &self.constellation
    }

    /// The channel used for transmission.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl PhyBackend for NativeBackend {
    fn map_bits_to_symbols(&self, bits: &[u8]) -> Result<Vec<Complex64>, PhyError> {
        self.constellation.map_bits(bits)
    }

    fn apply_channel(
        &self,
        rng: &mut dyn RngCore,
        tx: &[Complex64],
        noise_variance: f64,
    ) -> Result<ChannelOutput, PhyError> {
        self.channel.apply(rng, tx, noise_variance)
    }
}
