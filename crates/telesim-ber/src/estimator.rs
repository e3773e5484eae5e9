//! The per-operating-point BER estimator.
//!
//! Accumulation is an explicit value, [`BerAccumulator`], advanced by the
//! pure [`BerAccumulator::step`] and stopped by [`BerAccumulator::done`].
//! A point moves `Init -> Accumulating -> Done`. The stopping rule checks the
//! bit count only between batches, so the final count overshoots the target
//! by less than one batch; that imprecision is accepted, not corrected.

use crate::BerError;
use telesim_common::CancelToken;

/// Lifecycle of one operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorPhase {
    /// No batch has been absorbed yet.
    Init,
    /// At least one batch absorbed, target not yet reached.
    Accumulating,
    /// `bits >= target`.
    Done,
}

/// Counts produced by one Monte-Carlo batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Bits transmitted in the batch.
    pub bits: u64,
    /// Bits recovered incorrectly.
    pub bit_errors: u64,
    /// Symbols transmitted in the batch.
    pub symbols: u64,
    /// Symbols with at least one bit in error.
    pub symbol_errors: u64,
}

impl BatchOutcome {
    /// Compare transmitted and recovered bits group by group.
    ///
    /// Both slices hold whole k-bit groups in the same order.
    pub fn compare(tx: &[u8], rx: &[u8], bits_per_symbol: usize) -> Self {
        debug_assert_eq!(tx.len(), rx.len());
        let mut outcome = BatchOutcome {
            bits: tx.len() as u64,
            symbols: (tx.len() / bits_per_symbol) as u64,
            ..Default::default()
        };
        for (t, r) in tx.chunks_exact(bits_per_symbol).zip(rx.chunks_exact(bits_per_symbol)) {
            let errors = t.iter().zip(r).filter(|(a, b)| a != b).count() as u64;
            outcome.bit_errors += errors;
            if errors > 0 {
                outcome.symbol_errors += 1;
            }
        }
        outcome
    }
}

/// Running totals for one operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerAccumulator {
    target_bits: u64,
    bits: u64,
    bit_errors: u64,
    symbols: u64,
    symbol_errors: u64,
}

impl BerAccumulator {
    /// Start a point that stops once `target_bits` have been simulated.
    pub fn new(target_bits: u64) -> Self {
        Self {
            target_bits,
            bits: 0,
            bit_errors: 0,
            symbols: 0,
            symbol_errors: 0,
        }
    }

    /// Absorb one batch.
    #[must_use]
    pub fn step(self, batch: BatchOutcome) -> Self {
        Self {
            target_bits: self.target_bits,
            bits: self.bits + batch.bits,
            bit_errors: self.bit_errors + batch.bit_errors,
            symbols: self.symbols + batch.symbols,
            symbol_errors: self.symbol_errors + batch.symbol_errors,
        }
    }

    /// Whether the stopping rule is satisfied.
    pub fn done(&self) -> bool {
        self.bits >= self.target_bits
    }

    pub fn phase(&self) -> EstimatorPhase {
        if self.done() {
            EstimatorPhase::Done
        } else if self.bits == 0 {
            EstimatorPhase::Init
        } else {
            EstimatorPhase::Accumulating
        }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn bit_errors(&self) -> u64 {
        self.bit_errors
    }

    pub fn target_bits(&self) -> u64 {
        self.target_bits
    }

    /// Turn the totals into a point estimate.
    pub fn finalize(&self, snr_db: f64) -> BerPoint {
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        BerPoint {
            snr_db,
            bits: self.bits,
            bit_errors: self.bit_errors,
            ber: ratio(self.bit_errors, self.bits),
            symbols: self.symbols,
            symbol_errors: self.symbol_errors,
            ser: ratio(self.symbol_errors, self.symbols),
        }
    }
}

/// A finalized operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BerPoint {
    /// Operating point in dB.
    pub snr_db: f64,
    /// Bits simulated (at least the target).
    pub bits: u64,
    /// Bit errors observed.
    pub bit_errors: u64,
    /// `bit_errors / bits`.
    pub ber: f64,
    /// Symbols simulated.
    pub symbols: u64,
    /// Symbol errors observed.
    pub symbol_errors: u64,
    /// `symbol_errors / symbols`.
    pub ser: f64,
}

/// Run batches until the target is met.
///
/// `run_batch` simulates one batch; the token is checked before each one.
pub fn estimate_point<F>(
    snr_db: f64,
    target_bits: u64,
    cancel: &CancelToken,
    mut run_batch: F,
) -> Result<BerPoint, BerError>
where
    F: FnMut() -> Result<BatchOutcome, BerError>,
{
    let mut acc = BerAccumulator::new(target_bits);
    while !acc.done() {
        cancel.check()?;
        let batch = run_batch()?;
        if batch.bits == 0 {
            return Err(BerError::InvalidParameter("batch produced no bits".to_string()));
        }
        acc = acc.step(batch);
    }
    Ok(acc.finalize(snr_db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use telesim_common::Cancelled;

    fn batch(bits: u64, errors: u64) -> BatchOutcome {
        BatchOutcome {
            bits,
            bit_errors: errors,
            symbols: bits / 2,
            symbol_errors: errors,
        }
    }

    #[test]
    fn test_phases() {
        let acc = BerAccumulator::new(100);
        assert_eq!(acc.phase(), EstimatorPhase::Init);
        let acc = acc.step(batch(40, 1));
        assert_eq!(acc.phase(), EstimatorPhase::Accumulating);
        let acc = acc.step(batch(60, 1));
        assert_eq!(acc.phase(), EstimatorPhase::Done);
        assert!(acc.done());
    }

    #[test]
    fn test_step_is_pure() {
        let acc = BerAccumulator::new(10);
        let a = acc.step(batch(4, 1));
        let b = acc.step(batch(4, 1));
        assert_eq!(a, b);
        assert_eq!(acc.bits(), 0);
    }

    #[test]
    fn test_overshoot_is_less_than_one_batch() {
        let mut calls = 0;
        let point = estimate_point(0.0, 1000, &CancelToken::new(), || {
            calls += 1;
            Ok(batch(300, 3))
        })
        .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(point.bits, 1200);
        assert!(point.bits - 1000 < 300);
        assert!((point.ber - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_compare_counts_bits_and_symbols() {
        let tx = [0, 1, 1, 0, 1, 1, 0, 0];
        let rx = [0, 1, 0, 1, 1, 1, 0, 1];
        let outcome = BatchOutcome::compare(&tx, &rx, 2);
        assert_eq!(outcome.bits, 8);
        assert_eq!(outcome.bit_errors, 3);
        assert_eq!(outcome.symbols, 4);
        assert_eq!(outcome.symbol_errors, 2);
    }

    #[test]
    fn test_cancelled_before_first_batch() {
        let token = CancelToken::new();
        token.cancel();
        let err = estimate_point(0.0, 10, &token, || Ok(batch(2, 0))).unwrap_err();
        assert_eq!(err, BerError::Cancelled(Cancelled::Requested));
    }

    #[test]
    fn test_batch_error_aborts_point() {
        let err = estimate_point(0.0, 10, &CancelToken::new(), || {
            Err(BerError::InvalidParameter("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, BerError::InvalidParameter(_)));
    }

    #[test]
    fn test_empty_batches_are_rejected() {
        assert!(estimate_point(0.0, 10, &CancelToken::new(), || Ok(BatchOutcome::default())).is_err());
    }
}
