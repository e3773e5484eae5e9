//! # telesim-phy
//!
//! Signal-level building blocks for the telesim engine.
//!
//! ## Features
//!
//! - **Mapper/Demapper**: Unit-energy square QAM (QPSK as M = 4) with an
//!   MSB-first index convention and nearest-neighbour hard decisions
//! - **Channel Model**: AWGN and i.i.d. Rayleigh flat fading over `[B x nt]` batches
//! - **Backend Interface**: [`PhyBackend`] exposes exactly two operations,
//!   bit mapping and channel application, to the estimators
//! - **Receivers**: Maximum-ratio combining for the repetition-diversity
//!   MIMO baseline, and an APP (soft) demapper for single-antenna links

mod backend;
mod channel;
mod combiner;
mod constellation;
mod demapper;
mod error;

pub use backend::{NativeBackend, PhyBackend};
pub use channel::{
    complex_gaussian, ebno_db_to_noise_variance, snr_db_to_noise_variance, AntennaConfig,
    Channel, ChannelKind, ChannelOutput,
};
pub use combiner::{
    repeat_across_antennas, CombiningWeights, HardDecisionReceiver, MrcCombiner, MRC_EPSILON,
};
pub use constellation::{bits_to_index, index_to_bits, Constellation, Modulation, MAX_QAM_ORDER};
pub use demapper::{AppDemapper, DemapperKind};
pub use error::PhyError;

pub use num_complex::Complex64;
