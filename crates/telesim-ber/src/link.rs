//! Single-antenna BER curves over AWGN or Rayleigh flat fading.

use crate::estimator::{estimate_point, BatchOutcome, BerPoint};
use crate::{record_point, BerError};
use rand::{Rng, RngCore};
use statrs::function::erf::erfc;
use telesim_common::CancelToken;
use telesim_metrics::RunLabels;
use telesim_phy::{
    ebno_db_to_noise_variance, AntennaConfig, AppDemapper, Channel, ChannelKind, Complex64,
    CombiningWeights, Constellation, DemapperKind, Modulation, MrcCombiner, NativeBackend,
    PhyBackend,
};
use tracing::debug;

/// Parameters of a single-link BER sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkBerConfig {
    /// Modulation under test.
    pub modulation: Modulation,
    /// Channel the symbols pass through.
    pub channel: ChannelKind,
    /// Eb/N0 operating points in dB, processed in order.
    pub snr_db: Vec<f64>,
    /// Bits to simulate per operating point.
    pub n_bits: u64,
    /// Symbols per Monte-Carlo batch.
    pub batch_size: usize,
    /// Receiver decision rule.
    pub demapper: DemapperKind,
}

impl Default for LinkBerConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Qpsk,
            channel: ChannelKind::Awgn,
            snr_db: default_snr_list(),
            n_bits: 200_000,
            batch_size: 2000,
            demapper: DemapperKind::App,
        }
    }
}

/// The operating points used when a request gives none.
pub fn default_snr_list() -> Vec<f64> {
    vec![-5.0, 0.0, 5.0, 10.0, 15.0]
}

/// Upper bound on the elements (bits, samples or gains) one batch allocates.
pub const MAX_BATCH_ELEMENTS: usize = 1 << 24;

/// Reject a batch of `slots` slots with `per_slot` elements each when its
/// buffers would exceed [`MAX_BATCH_ELEMENTS`].
pub(crate) fn check_batch_size(what: &str, slots: usize, per_slot: usize) -> Result<(), BerError> {
    match slots.checked_mul(per_slot) {
        Some(n) if n <= MAX_BATCH_ELEMENTS => Ok(()),
        _ => Err(BerError::InvalidParameter(format!(
            "{} {} needs more than {} elements per batch",
            what, slots, MAX_BATCH_ELEMENTS
        ))),
    }
}

/// Check the sweep-level parameters shared by every BER experiment.
pub(crate) fn validate_sweep(snr_db: &[f64], n_bits: u64, batch_size: usize) -> Result<(), BerError> {
    if snr_db.is_empty() {
        return Err(BerError::InvalidParameter("snr_db_list is empty".to_string()));
    }
    if let Some(bad) = snr_db.iter().find(|s| !s.is_finite()) {
        return Err(BerError::InvalidParameter(format!("non-finite SNR value {}", bad)));
    }
    if n_bits == 0 {
        return Err(BerError::InvalidParameter("n_bits must be positive".to_string()));
    }
    if batch_size == 0 {
        return Err(BerError::InvalidParameter("batch_size must be positive".to_string()));
    }
    Ok(())
}

/// One BER curve over the requested operating points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BerCurve {
    /// Curve label (`"awgn"`, `"4x4"`, ...).
    pub label: String,
    /// One finalized point per operating point.
    pub points: Vec<BerPoint>,
}

impl BerCurve {
    pub fn snr_db(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.snr_db).collect()
    }

    pub fn ber(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ber).collect()
    }

    pub fn ser(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ser).collect()
    }

    /// Total bits simulated across all points.
    pub fn total_bits(&self) -> u64 {
        self.points.iter().map(|p| p.bits).sum()
    }
}

/// Result of a single-link sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkBerResult {
    /// Monte-Carlo curve.
    pub curve: BerCurve,
    /// Analytical AWGN symbol error rate at the same points (AWGN only).
    pub ser_theory: Option<Vec<f64>>,
}

/// Draw `n` uniform bits.
pub fn random_bits<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<u8> {
    (0..n).map(|_| u8::from(rng.gen::<bool>())).collect()
}

/// Symbol error rate of square M-QAM over AWGN at the given Eb/N0.
///
/// With `P = (1 - 1/√M)·erfc(√(3·Es/N0 / (2(M-1))))`, `SER = 2P - P²`.
pub fn qam_ser_awgn(modulation: Modulation, ebno_db: f64) -> f64 {
    let m = modulation.order() as f64;
    let k = modulation.bits_per_symbol() as f64;
    let es_n0 = 10f64.powf(ebno_db / 10.0) * k;
    let p = (1.0 - 1.0 / m.sqrt()) * erfc((3.0 * es_n0 / (2.0 * (m - 1.0))).sqrt());
    2.0 * p - p * p
}

/// Single-antenna receiver: soft APP decision or equalise-then-slice.
struct SisoReceiver<'a> {
    constellation: &'a Constellation,
    kind: DemapperKind,
    app: AppDemapper<'a>,
    equalizer: MrcCombiner,
}

impl<'a> SisoReceiver<'a> {
    fn new(constellation: &'a Constellation, kind: DemapperKind) -> Self {
        Self {
            constellation,
            kind,
            app: AppDemapper::new(constellation),
            equalizer: MrcCombiner::new(AntennaConfig::siso(), CombiningWeights::Effective),
        }
    }

    fn decide(
        &self,
        y: Complex64,
        h: Complex64,
        noise_variance: f64,
        scratch: &mut Vec<f64>,
        out: &mut [u8],
    ) -> Result<(), BerError> {
        match self.kind {
            DemapperKind::App => self.app.decide_into(y, h, noise_variance, scratch, out),
            DemapperKind::Hard => {
                let s = self.equalizer.combine(&[y], &[h])?;
                self.constellation.demap_hard_into(s, out);
            }
        }
        Ok(())
    }
}

fn run_link_batch<R: RngCore>(
    backend: &dyn PhyBackend,
    receiver: &SisoReceiver<'_>,
    rng: &mut R,
    batch_size: usize,
    noise_variance: f64,
) -> Result<BatchOutcome, BerError> {
    let k = receiver.constellation.bits_per_symbol();
    let bits = random_bits(rng, batch_size * k);
    let tx = backend.map_bits_to_symbols(&bits)?;
    let out = backend.apply_channel(rng, &tx, noise_variance)?;
    out.validate(AntennaConfig::siso())?;

    let one = Complex64::new(1.0, 0.0);
    let mut rx = vec![0u8; bits.len()];
    let mut scratch = Vec::with_capacity(receiver.constellation.order());
    for (slot, chunk) in rx.chunks_exact_mut(k).enumerate() {
        let h = out.gain_row(slot).map_or(one, |g| g[0]);
        receiver.decide(out.received_row(slot)[0], h, noise_variance, &mut scratch, chunk)?;
    }
    Ok(BatchOutcome::compare(&bits, &rx, k))
}

/// Estimate BER (and SER) at every operating point of `config`.
///
/// Operating points run sequentially; any failure aborts the whole sweep.
pub fn simulate_link_ber<R: RngCore>(
    config: &LinkBerConfig,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<LinkBerResult, BerError> {
    validate_sweep(&config.snr_db, config.n_bits, config.batch_size)?;
    check_batch_size("batch_size", config.batch_size, config.modulation.bits_per_symbol())?;

    let constellation = Constellation::new(config.modulation);
    let channel = Channel::new(config.channel, AntennaConfig::siso())?;
    let backend = NativeBackend::new(constellation.clone(), channel);
    let receiver = SisoReceiver::new(&constellation, config.demapper);
    let k = constellation.bits_per_symbol();
    let labels = RunLabels::new("ber")
        .with_modulation(config.modulation.label())
        .with_channel(config.channel.label());

    let mut points = Vec::with_capacity(config.snr_db.len());
    for &snr_db in &config.snr_db {
        let noise_variance = ebno_db_to_noise_variance(snr_db, k, 1.0);
        let point = estimate_point(snr_db, config.n_bits, cancel, || {
            run_link_batch(&backend, &receiver, &mut *rng, config.batch_size, noise_variance)
        })?;
        debug!(
            snr_db,
            ber = point.ber,
            bits = point.bits,
            "{} {} operating point done",
            config.modulation,
            config.channel
        );
        record_point(&labels, &point, (config.batch_size * k) as u64);
        points.push(point);
    }

    let ser_theory = (config.channel == ChannelKind::Awgn).then(|| {
        config
            .snr_db
            .iter()
            .map(|&s| qam_ser_awgn(config.modulation, s))
            .collect()
    });

    Ok(LinkBerResult {
        curve: BerCurve {
            label: config.channel.label().to_string(),
            points,
        },
        ser_theory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use telesim_common::seeded_rng;
    use telesim_phy::{ChannelOutput, PhyError};

    fn quick(modulation: Modulation, channel: ChannelKind, demapper: DemapperKind) -> LinkBerConfig {
        LinkBerConfig {
            modulation,
            channel,
            n_bits: 20_000,
            batch_size: 500,
            demapper,
            ..Default::default()
        }
    }

    #[test]
    fn test_qpsk_awgn_reference_points() {
        let mut rng = seeded_rng(1);
        let result = simulate_link_ber(&LinkBerConfig::default(), &mut rng, &CancelToken::new()).unwrap();
        let ber = result.curve.ber();
        assert_eq!(ber.len(), 5);
        assert!(ber[4] < 1e-3, "BER at 15 dB: {}", ber[4]);
        assert!(ber[0] > 0.05, "BER at -5 dB: {}", ber[0]);
        for p in &result.curve.points {
            assert!(p.bits >= 200_000 && p.bits < 200_000 + 4000);
        }
    }

    #[test]
    fn test_ber_decreases_with_snr() {
        for channel in [ChannelKind::Awgn, ChannelKind::FlatFading] {
            let mut rng = seeded_rng(2);
            let config = quick(Modulation::qam(16).unwrap(), channel, DemapperKind::App);
            let ber = simulate_link_ber(&config, &mut rng, &CancelToken::new()).unwrap().curve.ber();
            for w in ber.windows(2) {
                assert!(w[1] <= w[0], "{:?} not monotone: {:?}", channel, ber);
            }
        }
    }

    #[test]
    fn test_fading_is_worse_than_awgn() {
        let m = Modulation::Qpsk;
        let awgn = simulate_link_ber(&quick(m, ChannelKind::Awgn, DemapperKind::App), &mut seeded_rng(3), &CancelToken::new())
            .unwrap();
        let fading = simulate_link_ber(&quick(m, ChannelKind::FlatFading, DemapperKind::App), &mut seeded_rng(3), &CancelToken::new())
            .unwrap();
        // At 10 dB QPSK over AWGN is ~4e-6, Rayleigh ~2e-2.
        assert!(fading.curve.points[3].ber > awgn.curve.points[3].ber);
        assert!(fading.ser_theory.is_none());
        assert!(awgn.ser_theory.is_some());
    }

    #[test]
    fn test_ser_tracks_theory_on_awgn() {
        let mut rng = seeded_rng(4);
        let config = LinkBerConfig {
            modulation: Modulation::qam(16).unwrap(),
            snr_db: vec![0.0, 4.0],
            n_bits: 80_000,
            demapper: DemapperKind::Hard,
            ..Default::default()
        };
        let result = simulate_link_ber(&config, &mut rng, &CancelToken::new()).unwrap();
        let theory = result.ser_theory.unwrap();
        for (p, t) in result.curve.points.iter().zip(&theory) {
            assert!((p.ser - t).abs() < 0.1 * t, "measured {} theory {}", p.ser, t);
        }
    }

    #[test]
    fn test_qpsk_ser_theory_matches_closed_form() {
        // QPSK: P = 0.5 erfc(sqrt(Eb/N0)), SER = 2P - P^2.
        let p = 0.5 * erfc(1.0f64.sqrt());
        assert_relative_eq!(qam_ser_awgn(Modulation::Qpsk, 0.0), 2.0 * p - p * p, max_relative = 1e-12);
    }

    #[test]
    fn test_hard_and_app_agree_for_qpsk() {
        let a = simulate_link_ber(&quick(Modulation::Qpsk, ChannelKind::FlatFading, DemapperKind::App), &mut seeded_rng(5), &CancelToken::new())
            .unwrap();
        let h = simulate_link_ber(&quick(Modulation::Qpsk, ChannelKind::FlatFading, DemapperKind::Hard), &mut seeded_rng(5), &CancelToken::new())
            .unwrap();
        assert_eq!(a.curve.ber(), h.curve.ber());
    }

    #[test]
    fn test_same_seed_same_curve() {
        let config = quick(Modulation::qam(16).unwrap(), ChannelKind::FlatFading, DemapperKind::App);
        let a = simulate_link_ber(&config, &mut seeded_rng(9), &CancelToken::new()).unwrap();
        let b = simulate_link_ber(&config, &mut seeded_rng(9), &CancelToken::new()).unwrap();
        let c = simulate_link_ber(&config, &mut seeded_rng(10), &CancelToken::new()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.curve.ber(), c.curve.ber());
    }

    #[test]
    fn test_invalid_sweeps_are_rejected() {
        let mut rng = seeded_rng(0);
        let cancel = CancelToken::new();
        let empty = LinkBerConfig { snr_db: vec![], ..Default::default() };
        assert!(matches!(simulate_link_ber(&empty, &mut rng, &cancel), Err(BerError::InvalidParameter(_))));
        let zero = LinkBerConfig { batch_size: 0, ..Default::default() };
        assert!(simulate_link_ber(&zero, &mut rng, &cancel).is_err());
        let nan = LinkBerConfig { snr_db: vec![f64::NAN], ..Default::default() };
        assert!(simulate_link_ber(&nan, &mut rng, &cancel).is_err());
    }

    #[test]
    fn test_oversized_batch_is_rejected() {
        let mut rng = seeded_rng(0);
        let cancel = CancelToken::new();
        for batch_size in [usize::MAX, MAX_BATCH_ELEMENTS] {
            let config = LinkBerConfig { batch_size, ..Default::default() };
            let err = simulate_link_ber(&config, &mut rng, &cancel).unwrap_err();
            assert!(matches!(err, BerError::InvalidParameter(_)), "{:?}", err);
        }
        // QPSK carries two bits per slot, so half the bound still fits.
        assert!(check_batch_size("batch_size", MAX_BATCH_ELEMENTS / 2, 2).is_ok());
    }

    struct OfflineBackend;

    impl PhyBackend for OfflineBackend {
        fn map_bits_to_symbols(&self, _bits: &[u8]) -> Result<Vec<Complex64>, PhyError> {
            Err(PhyError::BackendUnavailable("accelerator offline".to_string()))
        }

        fn apply_channel(
            &self,
            _rng: &mut dyn RngCore,
            _tx: &[Complex64],
            _noise_variance: f64,
        ) -> Result<ChannelOutput, PhyError> {
            Err(PhyError::BackendUnavailable("accelerator offline".to_string()))
        }
    }

    #[test]
    fn test_unavailable_backend_fails_the_batch() {
        let constellation = Constellation::new(Modulation::Qpsk);
        let receiver = SisoReceiver::new(&constellation, DemapperKind::App);
        let err = run_link_batch(&OfflineBackend, &receiver, &mut seeded_rng(0), 10, 0.1).unwrap_err();
        assert!(matches!(err, BerError::Phy(PhyError::BackendUnavailable(_))));
    }

    #[test]
    fn test_cancellation_aborts_sweep() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = simulate_link_ber(&LinkBerConfig::default(), &mut seeded_rng(0), &cancel).unwrap_err();
        assert!(matches!(err, BerError::Cancelled(_)));
    }
}
