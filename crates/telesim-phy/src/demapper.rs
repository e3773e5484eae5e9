//! A-posteriori-probability (soft) demapping for single-antenna links.
//!
//! For `y = h·x + n` with `n ~ CN(0, N0)`, the LLR of bit `i` is
//! `ln Σ_{x: b_i=1} exp(-|y - h·x|² / N0) - ln Σ_{x: b_i=0} exp(-|y - h·x|² / N0)`,
//! evaluated with log-sum-exp. A positive LLR decides bit 1.

use crate::{index_to_bits, Constellation, PhyError};
use num_complex::Complex64;

/// Smallest noise variance used in the metric, so a noiseless link stays finite.
const MIN_NOISE_VARIANCE: f64 = 1e-12;

/// Which demapper the single-link BER path uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemapperKind {
    /// Exact log-likelihood ratios over the whole constellation.
    #[default]
    App,
    /// Nearest-neighbour decision.
    Hard,
}

impl DemapperKind {
    pub fn parse(name: &str) -> Result<Self, PhyError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "app" | "soft" => Ok(DemapperKind::App),
            "hard" | "nearest" => Ok(DemapperKind::Hard),
            other => Err(PhyError::InvalidParameter(format!("unknown demapper '{}'", other))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemapperKind::App => "app",
            DemapperKind::Hard => "hard",
        }
    }
}

/// Soft demapper with the bit labels of every point precomputed.
#[derive(Debug, Clone)]
pub struct AppDemapper<'a> {
    constellation: &'a Constellation,
    // labels[idx * k + i] is bit i of point idx
    labels: Vec<u8>,
}

impl<'a> AppDemapper<'a> {
    pub fn new(constellation: &'a Constellation) -> Self {
        let k = constellation.bits_per_symbol();
        let mut labels = vec![0u8; constellation.order() * k];
        for (idx, chunk) in labels.chunks_exact_mut(k).enumerate() {
            index_to_bits(idx, chunk);
        }
        Self {
            constellation,
            labels,
        }
    }

    /// Write the k LLRs of one received sample into `out`.
    ///
    /// `gain` is the channel coefficient (1 for AWGN). `scratch` holds the
    /// per-point metrics; pass the same buffer for every sample of a batch.
    pub fn llrs(&self, y: Complex64, gain: Complex64, noise_variance: f64, scratch: &mut Vec<f64>, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.constellation.bits_per_symbol());
        self.fill_metrics(y, gain, noise_variance, scratch);
        for (i, llr) in out.iter_mut().enumerate() {
            *llr = self.bit_llr(scratch, i);
        }
    }

    /// Soft-demap and decide, writing k bits into `out`.
    pub fn decide_into(
        &self,
        y: Complex64,
        gain: Complex64,
        noise_variance: f64,
        scratch: &mut Vec<f64>,
        out: &mut [u8],
    ) {
        self.fill_metrics(y, gain, noise_variance, scratch);
        for (i, bit) in out.iter_mut().enumerate() {
            *bit = u8::from(self.bit_llr(scratch, i) > 0.0);
        }
    }

    fn fill_metrics(&self, y: Complex64, gain: Complex64, noise_variance: f64, metrics: &mut Vec<f64>) {
        let n0 = noise_variance.max(MIN_NOISE_VARIANCE);
        metrics.clear();
        metrics.extend(
            self.constellation
                .points()
                .iter()
                .map(|&x| -(y - gain * x).norm_sqr() / n0),
        );
    }

    // log-sum-exp over the points labelled 1 minus the same over those labelled 0
    fn bit_llr(&self, metrics: &[f64], i: usize) -> f64 {
        let k = self.constellation.bits_per_symbol();
        let mut max1 = f64::NEG_INFINITY;
        let mut max0 = f64::NEG_INFINITY;
        for (idx, &m) in metrics.iter().enumerate() {
            if self.labels[idx * k + i] == 1 {
                max1 = max1.max(m);
            } else {
                max0 = max0.max(m);
            }
        }
        let mut sum1 = 0.0;
        let mut sum0 = 0.0;
        for (idx, &m) in metrics.iter().enumerate() {
            if self.labels[idx * k + i] == 1 {
                sum1 += (m - max1).exp();
            } else {
                sum0 += (m - max0).exp();
            }
        }
        (max1 + sum1.ln()) - (max0 + sum0.ln())
    }
}
