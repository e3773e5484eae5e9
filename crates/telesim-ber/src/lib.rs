//! # telesim-ber
//!
//! Monte-Carlo experiments built on `telesim-phy`.
//!
//! - **Estimator**: per-operating-point accumulation with an explicit
//!   stopping rule ([`BerAccumulator`], [`estimate_point`])
//! - **Single link**: BER/SER curves over AWGN or Rayleigh fading
//! - **MIMO baseline**: repetition diversity with MRC and hard decisions
//! - **Constellation**: noisy received samples for scatter plots
//!
//! Every experiment takes its random source and [`CancelToken`] from the
//! caller.
//!
//! [`CancelToken`]: telesim_common::CancelToken

mod error;
mod estimator;
mod link;
mod mimo;
mod scatter;

pub use error::BerError;
pub use estimator::{estimate_point, BatchOutcome, BerAccumulator, BerPoint, EstimatorPhase};
pub use link::{
    default_snr_list, qam_ser_awgn, random_bits, simulate_link_ber, BerCurve, LinkBerConfig,
    LinkBerResult, MAX_BATCH_ELEMENTS,
};
pub use mimo::{simulate_mimo_ber, MimoBerConfig, MimoBerResult, MIMO_NOTE};
pub use scatter::{simulate_constellation, ConstellationConfig, ConstellationResult};

use telesim_metrics::{metric_defs, RunLabels};

/// Emit the Monte-Carlo counters for a finalized point.
fn record_point(labels: &RunLabels, point: &BerPoint, bits_per_batch: u64) {
    let base = labels.to_labels();
    let batches = point.bits.div_ceil(bits_per_batch.max(1));
    metrics::counter!(metric_defs::BER_BATCHES.name, base.as_slice()).increment(batches);
    metrics::counter!(metric_defs::BER_BITS.name, base.as_slice()).increment(point.bits);
    metrics::counter!(metric_defs::BER_ERRORS.name, base.as_slice()).increment(point.bit_errors);

    let with_snr = labels.with(&[("snr_db", format!("{}", point.snr_db))]);
    metrics::gauge!(metric_defs::BER_ESTIMATE.name, with_snr.as_slice()).set(point.ber);
}
