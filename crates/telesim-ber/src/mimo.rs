//! Repetition-diversity MIMO BER baseline.
//!
//! Every slot carries one symbol repeated on all `nt` transmit antennas over
//! i.i.d. Rayleigh flat fading. The receiver combines the `nr` branches with
//! MRC and slices to the nearest point. This measures diversity gain only; it
//! is not a spatial-multiplexing decoder.

use crate::estimator::{estimate_point, BatchOutcome};
use crate::link::{check_batch_size, default_snr_list, random_bits, validate_sweep, BerCurve};
use crate::{record_point, BerError};
use rand::RngCore;
use telesim_common::CancelToken;
use telesim_metrics::RunLabels;
use telesim_phy::{
    ebno_db_to_noise_variance, repeat_across_antennas, AntennaConfig, Channel, ChannelKind,
    CombiningWeights, Constellation, HardDecisionReceiver, Modulation, MrcCombiner, NativeBackend,
    PhyBackend,
};
use tracing::debug;

/// Short description reported with every MIMO result.
pub const MIMO_NOTE: &str = "Repetition TX + MRC + hard demap baseline (no spatial multiplexing).";

/// Parameters of a MIMO comparison sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct MimoBerConfig {
    pub modulation: Modulation,
    /// Eb/N0 operating points in dB.
    pub snr_db: Vec<f64>,
    /// Antenna layouts, one curve each.
    pub configs: Vec<AntennaConfig>,
    /// Bits per operating point.
    pub n_bits: u64,
    /// Symbol slots per batch.
    pub batch_size: usize,
    pub combining: CombiningWeights,
}

impl Default for MimoBerConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Qam { order: 64 },
            snr_db: default_snr_list(),
            configs: vec![AntennaConfig::siso(), AntennaConfig { nt: 4, nr: 4 }],
            n_bits: 30_000,
            batch_size: 200,
            combining: CombiningWeights::Effective,
        }
    }
}

/// One curve per antenna layout, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct MimoBerResult {
    pub curves: Vec<BerCurve>,
}

impl MimoBerResult {
    /// Curve for a layout label such as `"4x4"`.
    pub fn curve(&self, label: &str) -> Option<&BerCurve> {
        self.curves.iter().find(|c| c.label == label)
    }
}

fn run_mimo_batch<R: RngCore>(
    backend: &dyn PhyBackend,
    receiver: &HardDecisionReceiver<'_>,
    rng: &mut R,
    nt: usize,
    k: usize,
    batch_size: usize,
    noise_variance: f64,
) -> Result<BatchOutcome, BerError> {
    let bits = random_bits(rng, batch_size * k);
    let symbols = backend.map_bits_to_symbols(&bits)?;
    let tx = repeat_across_antennas(&symbols, nt);
    let out = backend.apply_channel(rng, &tx, noise_variance)?;
    let rx = receiver.detect(&out)?;
    if rx.len() != bits.len() {
        return Err(telesim_phy::PhyError::ShapeMismatch {
            what: "recovered bits",
            expected: bits.len(),
            actual: rx.len(),
        }
        .into());
    }
    Ok(BatchOutcome::compare(&bits, &rx, k))
}

/// Estimate one BER curve per antenna layout.
pub fn simulate_mimo_ber<R: RngCore>(
    config: &MimoBerConfig,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<MimoBerResult, BerError> {
    validate_sweep(&config.snr_db, config.n_bits, config.batch_size)?;
    if config.configs.is_empty() {
        return Err(BerError::InvalidParameter("no antenna configurations given".to_string()));
    }

    let constellation = Constellation::new(config.modulation);
    let k = constellation.bits_per_symbol();

    // Validate every layout before spending time on the first one.
    let channels = config
        .configs
        .iter()
        .map(|&antennas| -> Result<Channel, BerError> {
            // A slot holds k bits and an nr x nt gain matrix.
            let per_slot = antennas.nr.checked_mul(antennas.nt).map_or(usize::MAX, |g| g.max(k));
            check_batch_size("batch_size", config.batch_size, per_slot)?;
            Ok(Channel::new(ChannelKind::FlatFading, antennas)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut curves = Vec::with_capacity(channels.len());
    for channel in channels {
        let antennas = channel.antennas();
        let backend = NativeBackend::new(constellation.clone(), channel);
        let receiver = HardDecisionReceiver::new(&constellation, MrcCombiner::new(antennas, config.combining));
        let labels = RunLabels::new("mimo_comparison")
            .with_modulation(config.modulation.label())
            .with_channel(antennas.label());

        let mut points = Vec::with_capacity(config.snr_db.len());
        for &snr_db in &config.snr_db {
            let noise_variance = ebno_db_to_noise_variance(snr_db, k, 1.0);
            let point = estimate_point(snr_db, config.n_bits, cancel, || {
                run_mimo_batch(
                    &backend,
                    &receiver,
                    &mut *rng,
                    antennas.nt,
                    k,
                    config.batch_size,
                    noise_variance,
                )
            })?;
            debug!(snr_db, ber = point.ber, "{} {} operating point done", config.modulation, antennas.label());
            record_point(&labels, &point, (config.batch_size * k) as u64);
            points.push(point);
        }
        curves.push(BerCurve {
            label: antennas.label(),
            points,
        });
    }

    Ok(MimoBerResult { curves })
}
