//! AWGN and flat-fading channel models.
//!
//! Both channels work on a batch of `B` symbol slots. The transmitted tensor
//! is laid out `[B x nt]` (row-major), the received tensor `[B x nr]` and,
//! for flat fading, the gain tensor `[B x nr x nt]`. Fading gains are drawn
//! fresh for every slot of every call and are never carried across batches.

use crate::PhyError;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Which channel a batch passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Additive white Gaussian noise only.
    Awgn,
    /// i.i.d. Rayleigh flat fading followed by AWGN.
    FlatFading,
}

impl ChannelKind {
    /// Parse a channel name. `"rayleigh"`, `"flat_fading"` and `"fading"` all
    /// select [`ChannelKind::FlatFading`].
    pub fn parse(name: &str) -> Result<Self, PhyError> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "awgn" => Ok(ChannelKind::Awgn),
            "rayleigh" | "flat_fading" | "flatfading" | "fading" => Ok(ChannelKind::FlatFading),
            _ => Err(PhyError::UnsupportedChannel(name.to_string())),
        }
    }

    /// Name used in KPIs and file names.
    pub fn label(&self) -> &'static str {
        match self {
            ChannelKind::Awgn => "awgn",
            ChannelKind::FlatFading => "rayleigh",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Transmit/receive antenna counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AntennaConfig {
    /// Transmit antennas.
    pub nt: usize,
    /// Receive antennas.
    pub nr: usize,
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self::siso()
    }
}

impl AntennaConfig {
    /// Validate raw (possibly negative) counts.
    pub fn new(nt: i64, nr: i64) -> Result<Self, PhyError> {
        if nt < 1 || nr < 1 {
            return Err(PhyError::InvalidAntennaConfig { nt, nr });
        }
        Ok(Self {
            nt: nt as usize,
            nr: nr as usize,
        })
    }

    /// Single antenna on both ends.
    pub const fn siso() -> Self {
        Self { nt: 1, nr: 1 }
    }

    /// Label such as `"4x4"`.
    pub fn label(&self) -> String {
        format!("{}x{}", self.nt, self.nr)
    }
}

/// Noise variance for an Eb/N0 operating point.
///
/// `N0 = 1 / (10^(ebno_db / 10) * k * coderate)` for unit-energy symbols
/// carrying `k` bits.
pub fn ebno_db_to_noise_variance(ebno_db: f64, bits_per_symbol: usize, coderate: f64) -> f64 {
    1.0 / (10f64.powf(ebno_db / 10.0) * bits_per_symbol as f64 * coderate)
}

/// Noise variance for a plain Es/N0 (symbol SNR) value in dB.
pub fn snr_db_to_noise_variance(snr_db: f64) -> f64 {
    1.0 / 10f64.powf(snr_db / 10.0)
}

/// Draw a circularly-symmetric complex Gaussian sample with total variance `variance`.
pub fn complex_gaussian<R: Rng + ?Sized>(rng: &mut R, variance: f64) -> Complex64 {
    let sigma = (variance / 2.0).sqrt();
    let re: f64 = StandardNormal.sample(rng);
    let im: f64 = StandardNormal.sample(rng);
    Complex64::new(re * sigma, im * sigma)
}

/// Channel output for one batch.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    /// Antenna layout the batch went through.
    pub antennas: AntennaConfig,
    /// Number of symbol slots.
    pub batch: usize,
    /// Received samples, `[batch x nr]`.
    pub received: Vec<Complex64>,
    /// Channel gains, `[batch x nr x nt]`. `None` means the identity (AWGN).
    pub gains: Option<Vec<Complex64>>,
}

impl ChannelOutput {
    /// Check that the buffers agree with `antennas`.
    pub fn validate(&self, antennas: AntennaConfig) -> Result<(), PhyError> {
        if self.antennas != antennas {
            return Err(PhyError::ShapeMismatch {
                what: "antenna layout",
                expected: antennas.nt * antennas.nr,
                actual: self.antennas.nt * self.antennas.nr,
            });
        }
        let expected = self.batch * antennas.nr;
        if self.received.len() != expected {
            return Err(PhyError::ShapeMismatch {
                what: "received samples",
                expected,
                actual: self.received.len(),
            });
        }
        if let Some(gains) = &self.gains {
            let expected = self.batch * antennas.nr * antennas.nt;
            if gains.len() != expected {
                return Err(PhyError::ShapeMismatch {
                    what: "channel gains",
                    expected,
                    actual: gains.len(),
                });
            }
        }
        Ok(())
    }

    /// Received samples of one slot (length nr).
    pub fn received_row(&self, slot: usize) -> &[Complex64] {
        let nr = self.antennas.nr;
        &self.received[slot * nr..(slot + 1) * nr]
    }

    /// Gain matrix of one slot (length nr * nt), or `None` for the identity.
    pub fn gain_row(&self, slot: usize) -> Option<&[Complex64]> {
        let n = self.antennas.nr * self.antennas.nt;
        self.gains.as_ref().map(|g| &g[slot * n..(slot + 1) * n])
    }
}

/// A configured channel.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    kind: ChannelKind,
    antennas: AntennaConfig,
}

impl Channel {
    /// Create a channel. AWGN has no mixing, so it requires `nt == nr`.
    pub fn new(kind: ChannelKind, antennas: AntennaConfig) -> Result<Self, PhyError> {
        if antennas.nt == 0 || antennas.nr == 0 {
            return Err(PhyError::InvalidAntennaConfig {
                nt: antennas.nt as i64,
                nr: antennas.nr as i64,
            });
        }
        if kind == ChannelKind::Awgn && antennas.nt != antennas.nr {
            return Err(PhyError::UnsupportedChannel(format!(
                "awgn cannot map {} transmit onto {} receive antennas",
                antennas.nt, antennas.nr
            )));
        }
        Ok(Self { kind, antennas })
    }

    /// The channel kind.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// The antenna layout.
    pub fn antennas(&self) -> AntennaConfig {
        self.antennas
    }

    /// Pass a `[B x nt]` batch through the channel.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        tx: &[Complex64],
        noise_variance: f64,
    ) -> Result<ChannelOutput, PhyError> {
        if !noise_variance.is_finite() || noise_variance < 0.0 {
            return Err(PhyError::InvalidParameter(format!(
                "noise variance must be finite and non-negative, got {}",
                noise_variance
            )));
        }
        let AntennaConfig { nt, nr } = self.antennas;
        if tx.len() % nt != 0 {
            return Err(PhyError::ShapeMismatch {
                what: "transmitted symbols",
                expected: (tx.len() / nt + 1) * nt,
                actual: tx.len(),
            });
        }
        let batch = tx.len() / nt;

        match self.kind {
            ChannelKind::Awgn => {
                let received = tx
                    .iter()
                    .map(|&x| x + complex_gaussian(rng, noise_variance))
                    .collect();
                Ok(ChannelOutput {
                    antennas: self.antennas,
                    batch,
                    received,
                    gains: None,
                })
            }
            ChannelKind::FlatFading => {
                let mut received = Vec::with_capacity(batch * nr);
                let mut gains = Vec::with_capacity(batch * nr * nt);
                for x in tx.chunks_exact(nt) {
                    for _ in 0..nr {
                        let mut y = Complex64::new(0.0, 0.0);
                        for &xt in x {
                            let h = complex_gaussian(rng, 1.0);
                            y += h * xt;
                            gains.push(h);
                        }
                        received.push(y + complex_gaussian(rng, noise_variance));
                    }
                }
                Ok(ChannelOutput {
                    antennas: self.antennas,
                    batch,
                    received,
                    gains: Some(gains),
                })
            }
        }
    }
}
