//! Noisy constellation samples for scatter plots.

use crate::link::{check_batch_size, random_bits};
use crate::BerError;
use rand::RngCore;
use telesim_common::CancelToken;
use telesim_phy::{
    snr_db_to_noise_variance, AntennaConfig, Channel, ChannelKind, Complex64, Constellation,
    Modulation, NativeBackend, PhyBackend,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConstellationConfig {
    pub modulation: Modulation,
    /// Es/N0 in dB.
    pub snr_db: f64,
    pub n_symbols: usize,
}

impl Default for ConstellationConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Qam { order: 16 },
            snr_db: 15.0,
            n_symbols: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstellationResult {
    /// Received samples, one per transmitted symbol.
    pub samples: Vec<Complex64>,
    /// Transmitted symbols, aligned with `samples`.
    pub transmitted: Vec<Complex64>,
    /// The ideal constellation points.
    pub ideal: Vec<Complex64>,
    /// Per-sample complex noise variance.
    pub noise_variance: f64,
    /// RMS error-vector magnitude relative to the mean transmitted power.
    pub evm_rms: f64,
}

/// Push `n_symbols` random symbols through AWGN at `snr_db` (Es/N0).
pub fn simulate_constellation<R: RngCore>(
    config: &ConstellationConfig,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<ConstellationResult, BerError> {
    if config.n_symbols == 0 {
        return Err(BerError::InvalidParameter("n_symbols must be positive".to_string()));
    }
    if !config.snr_db.is_finite() {
        return Err(BerError::InvalidParameter(format!("non-finite SNR value {}", config.snr_db)));
    }
    check_batch_size("n_symbols", config.n_symbols, config.modulation.bits_per_symbol())?;
    cancel.check()?;

    let constellation = Constellation::new(config.modulation);
    let k = constellation.bits_per_symbol();
    let channel = Channel::new(ChannelKind::Awgn, AntennaConfig::siso())?;
    let backend = NativeBackend::new(constellation.clone(), channel);
    let noise_variance = snr_db_to_noise_variance(config.snr_db);

    let bits = random_bits(rng, config.n_symbols * k);
    let transmitted = backend.map_bits_to_symbols(&bits)?;
    let out = backend.apply_channel(rng, &transmitted, noise_variance)?;

    let error_power = out
        .received
        .iter()
        .zip(&transmitted)
        .map(|(y, x)| (y - x).norm_sqr())
        .sum::<f64>();
    let signal_power = transmitted.iter().map(|x| x.norm_sqr()).sum::<f64>();
    let evm_rms = (error_power / signal_power).sqrt();

    Ok(ConstellationResult {
        samples: out.received,
        transmitted,
        ideal: constellation.points().to_vec(),
        noise_variance,
        evm_rms,
    })
}
