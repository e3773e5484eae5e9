//! Square QAM constellations and the bit <-> symbol mapping.
//!
//! Points sit on the odd-integer lattice `{±1, ±3, ...}` on both axes and are
//! rescaled to unit average energy. Index `i = r * m + c` addresses row `r`
//! (imaginary level) and column `c` (real level) of the `m x m` lattice, and
//! is written MSB-first into `k = log2(M)` bits. QPSK is the `M = 4` case.

use crate::PhyError;
use num_complex::Complex64;

/// Largest supported QAM order (16 bits per symbol).
pub const MAX_QAM_ORDER: u32 = 1 << 16;

/// A modulation scheme understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    /// Quadrature phase-shift keying (4 points).
    Qpsk,
    /// Square M-ary QAM.
    Qam {
        /// Constellation size M.
        order: u32,
    },
}

impl Modulation {
    /// Parse a modulation tag such as `"qpsk"`, `"16qam"`, `"16-QAM"` or `"qam64"`.
    ///
    /// Matching is case-insensitive and ignores `-`, `_` and spaces.
    pub fn parse(tag: &str) -> Result<Self, PhyError> {
        let norm: String = tag
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        if norm == "qpsk" {
            return Ok(Modulation::Qpsk);
        }

        let digits = norm
            .strip_suffix("qam")
            .or_else(|| norm.strip_prefix("qam"))
            .ok_or_else(|| PhyError::UnsupportedModulation(tag.to_string()))?;
        let order: u32 = digits
            .parse()
            .map_err(|_| PhyError::UnsupportedModulation(tag.to_string()))?;

        Self::qam(order)
    }

    /// Square QAM of the given order.
    pub fn qam(order: u32) -> Result<Self, PhyError> {
        if order < 4 {
            if order == 2 || order == 3 {
                return Err(PhyError::NonSquareOrder(order));
            }
            return Err(PhyError::UnsupportedModulation(format!("{}-QAM", order)));
        }
        let side = (order as f64).sqrt().round() as u32;
        if side * side != order {
            return Err(PhyError::NonSquareOrder(order));
        }
        if !order.is_power_of_two() || order > MAX_QAM_ORDER {
            return Err(PhyError::UnsupportedModulation(format!("{}-QAM", order)));
        }
        Ok(Modulation::Qam { order })
    }

    /// Number of constellation points M.
    pub fn order(&self) -> u32 {
        match self {
            Modulation::Qpsk => 4,
            Modulation::Qam { order } => *order,
        }
    }

    /// Bits carried per symbol, `k = log2(M)`.
    pub fn bits_per_symbol(&self) -> usize {
        self.order().trailing_zeros() as usize
    }

    /// Lowercase tag used in KPIs and file names (`"qpsk"`, `"16qam"`).
    pub fn label(&self) -> String {
        match self {
            Modulation::Qpsk => "qpsk".to_string(),
            Modulation::Qam { order } => format!("{}qam", order),
        }
    }
}

impl std::fmt::Display for Modulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modulation::Qpsk => write!(f, "QPSK"),
            Modulation::Qam { order } => write!(f, "{}-QAM", order),
        }
    }
}

/// Pack an MSB-first bit group into a symbol index.
pub fn bits_to_index(bits: &[u8]) -> usize {
    bits.iter().fold(0usize, |acc, &b| (acc << 1) | (b & 1) as usize)
}

/// Unpack a symbol index into `out.len()` bits, MSB first.
pub fn index_to_bits(index: usize, out: &mut [u8]) {
    let k = out.len();
    for (i, bit) in out.iter_mut().enumerate() {
        *bit = ((index >> (k - 1 - i)) & 1) as u8;
    }
}

/// A unit-energy square QAM constellation, built once per request.
#[derive(Debug, Clone)]
pub struct Constellation {
    modulation: Modulation,
    bits_per_symbol: usize,
    points: Vec<Complex64>,
}

impl Constellation {
    /// Build the lattice for `modulation` and normalise it to unit average energy.
    pub fn new(modulation: Modulation) -> Self {
        let order = modulation.order() as usize;
        let side = (order as f64).sqrt().round() as usize;
        let level = |i: usize| -((side as f64) - 1.0) + 2.0 * i as f64;

        let mut points: Vec<Complex64> = (0..order)
            .map(|idx| Complex64::new(level(idx % side), level(idx / side)))
            .collect();

        let mean_energy = points.iter().map(|p| p.norm_sqr()).sum::<f64>() / order as f64;
        let scale = mean_energy.sqrt().recip();
        for p in points.iter_mut() {
            *p *= scale;
        }

        Self {
            modulation,
            bits_per_symbol: modulation.bits_per_symbol(),
            points,
        }
    }

    /// The modulation this constellation was built for.
    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    /// Number of points M.
    pub fn order(&self) -> usize {
        self.points.len()
    }

    /// Bits per symbol k.
    pub fn bits_per_symbol(&self) -> usize {
        self.bits_per_symbol
    }

    /// All points in index order.
    pub fn points(&self) -> &[Complex64] {
        &self.points
    }

    /// Point for a symbol index.
    pub fn point(&self, index: usize) -> Complex64 {
        self.points[index]
    }

    /// Map one k-bit group to its symbol.
    pub fn map(&self, bits: &[u8]) -> Result<Complex64, PhyError> {
        if bits.len() != self.bits_per_symbol {
            return Err(PhyError::ShapeMismatch {
                what: "bit group",
                expected: self.bits_per_symbol,
                actual: bits.len(),
            });
        }
        if let Some(&bad) = bits.iter().find(|&&b| b > 1) {
            return Err(PhyError::InvalidBit(bad));
        }
        Ok(self.points[bits_to_index(bits)])
    }

    /// Map a flat bit buffer (a whole number of k-bit groups) to symbols.
    pub fn map_bits(&self, bits: &[u8]) -> Result<Vec<Complex64>, PhyError> {
        let k = self.bits_per_symbol;
        if bits.len() % k != 0 {
            return Err(PhyError::ShapeMismatch {
                what: "bit buffer",
                expected: (bits.len() / k + 1) * k,
                actual: bits.len(),
            });
        }
        bits.chunks_exact(k).map(|group| self.map(group)).collect()
    }

    /// Index of the point nearest to `y` in squared Euclidean distance.
    ///
    /// Ties resolve to the lowest index.
    pub fn nearest_index(&self, y: Complex64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, p) in self.points.iter().enumerate() {
            let dist = (y - p).norm_sqr();
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        best
    }

    /// Nearest-neighbour hard decision, written into `out` (length k).
    pub fn demap_hard_into(&self, y: Complex64, out: &mut [u8]) {
        index_to_bits(self.nearest_index(y), out);
    }

    /// Nearest-neighbour hard decision.
    pub fn demap_hard(&self, y: Complex64) -> Vec<u8> {
        let mut bits = vec![0u8; self.bits_per_symbol];
        self.demap_hard_into(y, &mut bits);
        bits
    }
}
