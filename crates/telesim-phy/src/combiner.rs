//! Maximum-ratio combining and hard decision for the repetition-diversity
//! MIMO baseline.
//!
//! The same symbol is sent on every transmit antenna. This is a diversity
//! baseline, not a spatial-multiplexing decoder: one symbol per slot is
//! recovered regardless of `nt`.

use crate::{AntennaConfig, ChannelOutput, Constellation, PhyError};
use num_complex::Complex64;

/// Stabiliser added to the combining denominator.
pub const MRC_EPSILON: f64 = 1e-9;

/// How the combiner weights the per-path gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombiningWeights {
    /// Weight each receive antenna by its effective gain `g_r = Σ_t h[r,t]`:
    /// `Σ_r conj(g_r) y_r / (Σ_r |g_r|² + ε)`.
    #[default]
    Effective,
    /// Per-path normalisation: `Σ_{r,t} conj(h[r,t]) y_r / (Σ_{r,t} |h[r,t]|² + ε)`.
    PerPath,
}

impl CombiningWeights {
    /// Parse `"effective"` or `"per_path"`.
    pub fn parse(name: &str) -> Result<Self, PhyError> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "effective" | "mrc" => Ok(CombiningWeights::Effective),
            "per_path" | "perpath" => Ok(CombiningWeights::PerPath),
            other => Err(PhyError::InvalidParameter(format!("unknown combining rule '{}'", other))),
        }
    }

    /// Name used in KPIs.
    pub fn label(&self) -> &'static str {
        match self {
            CombiningWeights::Effective => "effective",
            CombiningWeights::PerPath => "per_path",
        }
    }
}

/// Build the repetition transmit tensor `[B x nt]` from one symbol per slot.
pub fn repeat_across_antennas(symbols: &[Complex64], nt: usize) -> Vec<Complex64> {
    symbols
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(nt))
        .collect()
}

/// Maximum-ratio combiner for a fixed antenna layout.
#[derive(Debug, Clone, Copy)]
pub struct MrcCombiner {
    antennas: AntennaConfig,
    weights: CombiningWeights,
}

impl MrcCombiner {
    /// Create a combiner.
    pub fn new(antennas: AntennaConfig, weights: CombiningWeights) -> Self {
        Self { antennas, weights }
    }

    /// Combine one slot. `received` has length nr, `gains` is `[nr x nt]`.
    pub fn combine(&self, received: &[Complex64], gains: &[Complex64]) -> Result<Complex64, PhyError> {
        let AntennaConfig { nt, nr } = self.antennas;
        if received.len() != nr {
            return Err(PhyError::ShapeMismatch {
                what: "received samples",
                expected: nr,
                actual: received.len(),
            });
        }
        if gains.len() != nr * nt {
            return Err(PhyError::ShapeMismatch {
                what: "channel gains",
                expected: nr * nt,
                actual: gains.len(),
            });
        }

        let mut num = Complex64::new(0.0, 0.0);
        let mut den = 0.0;
        for (y, h_row) in received.iter().zip(gains.chunks_exact(nt)) {
            match self.weights {
                CombiningWeights::Effective => {
                    let g: Complex64 = h_row.iter().sum();
                    num += g.conj() * y;
                    den += g.norm_sqr();
                }
                CombiningWeights::PerPath => {
                    for h in h_row {
                        num += h.conj() * y;
                        den += h.norm_sqr();
                    }
                }
            }
        }
        Ok(num / (den + MRC_EPSILON))
    }

    /// Combine every slot of a channel output.
    ///
    /// An output without a gain tensor is treated as the identity channel.
    pub fn combine_batch(&self, output: &ChannelOutput) -> Result<Vec<Complex64>, PhyError> {
        output.validate(self.antennas)?;

        let identity = identity_gains(self.antennas);
        (0..output.batch)
            .map(|slot| {
                let gains = output.gain_row(slot).unwrap_or(&identity);
                self.combine(output.received_row(slot), gains)
            })
            .collect()
    }
}

fn identity_gains(antennas: AntennaConfig) -> Vec<Complex64> {
    let AntennaConfig { nt, nr } = antennas;
    (0..nr * nt)
        .map(|i| {
            if i / nt == i % nt {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect()
}

/// Combiner followed by nearest-neighbour decision.
#[derive(Debug, Clone)]
pub struct HardDecisionReceiver<'a> {
    constellation: &'a Constellation,
    combiner: MrcCombiner,
}

impl<'a> HardDecisionReceiver<'a> {
    /// Create a receiver.
    pub fn new(constellation: &'a Constellation, combiner: MrcCombiner) -> Self {
        Self {
            constellation,
            combiner,
        }
    }

    /// Recover `batch * k` bits from a channel output.
    pub fn detect(&self, output: &ChannelOutput) -> Result<Vec<u8>, PhyError> {
        let k = self.constellation.bits_per_symbol();
        let combined = self.combiner.combine_batch(output)?;
        let mut bits = vec![0u8; combined.len() * k];
        for (s, out) in combined.iter().zip(bits.chunks_exact_mut(k)) {
            self.constellation.demap_hard_into(*s, out);
        }
        Ok(bits)
    }
}
