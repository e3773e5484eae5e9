//! Multi-emitter radio maps.

use crate::propagation::{radio_map, Emitter, PowerMapGrid, PropagationParams, MAX_GRID_CELLS};
use crate::LinkError;
use telesim_common::CancelToken;
use tracing::debug;

/// How per-emitter maps are reduced into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CombineMode {
    /// Strongest server: per-cell maximum in dBm.
    #[default]
    Max,
    /// Aggregate power: linear milliwatt sum converted back to dBm.
    Sum,
}

impl CombineMode {
    pub fn parse(name: &str) -> Result<Self, LinkError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(CombineMode::Max),
            "sum" => Ok(CombineMode::Sum),
            _ => Err(LinkError::UnknownCombineMode(name.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CombineMode::Max => "max",
            CombineMode::Sum => "sum",
        }
    }

    /// Reduce per-emitter powers (dBm) at one cell.
    ///
    /// The sum is taken relative to the strongest term, so it is never below
    /// the maximum.
    pub fn reduce(&self, powers_dbm: &[f64]) -> f64 {
        let max = powers_dbm.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        match self {
            CombineMode::Max => max,
            CombineMode::Sum => {
                let linear: f64 = powers_dbm.iter().map(|p| 10f64.powf((p - max) / 10.0)).sum();
                max + 10.0 * linear.log10()
            }
        }
    }
}

impl std::fmt::Display for CombineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Reduce a stack of equally-shaped maps along the emitter axis.
pub fn combine_maps(maps: Vec<PowerMapGrid>, mode: CombineMode) -> Result<PowerMapGrid, LinkError> {
    let mut iter = maps.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| LinkError::InvalidEmitters("no maps to combine".to_string()))?;
    let rest: Vec<PowerMapGrid> = iter.collect();
    for m in &rest {
        if m.shape() != first.shape() {
            return Err(LinkError::ShapeMismatch {
                expected: first.shape(),
                actual: m.shape(),
            });
        }
    }

    let mut stack = Vec::with_capacity(rest.len() + 1);
    let values_dbm = (0..first.values_dbm.len())
        .map(|i| {
            stack.clear();
            stack.push(first.values_dbm[i]);
            stack.extend(rest.iter().map(|m| m.values_dbm[i]));
            mode.reduce(&stack)
        })
        .collect();

    Ok(PowerMapGrid {
        xs: first.xs,
        ys: first.ys,
        values_dbm,
    })
}

fn validate_emitters(emitters: &[Emitter]) -> Result<(), LinkError> {
    if emitters.is_empty() {
        return Err(LinkError::InvalidEmitters("at least one emitter is required".to_string()));
    }
    Ok(())
}

/// Build one map per emitter and combine them.
pub fn multi_radio_map(
    params: &PropagationParams,
    emitters: &[Emitter],
    mode: CombineMode,
    cancel: &CancelToken,
) -> Result<PowerMapGrid, LinkError> {
    validate_emitters(emitters)?;
    params.validate()?;
    // One grid per emitter is alive until the combination.
    let cells = params.rx_grid_size * params.rx_grid_size;
    if cells.checked_mul(emitters.len()).map_or(true, |n| n > MAX_GRID_CELLS) {
        return Err(LinkError::InvalidGrid(format!(
            "{} emitters on a {}x{} grid exceed {} cells",
            emitters.len(),
            params.rx_grid_size,
            params.rx_grid_size,
            MAX_GRID_CELLS
        )));
    }
    let maps = emitters
        .iter()
        .map(|e| radio_map(params, e, cancel))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(emitters = emitters.len(), mode = mode.label(), "combining radio maps");
    combine_maps(maps, mode)
}

/// Combined power at a single point, without building a grid.
pub fn combined_power_dbm(
    params: &PropagationParams,
    emitters: &[Emitter],
    mode: CombineMode,
    x: f64,
    y: f64,
) -> Result<f64, LinkError> {
    params.validate()?;
    validate_emitters(emitters)?;
    let powers: Vec<f64> = emitters
        .iter()
        .map(|e| params.received_power_dbm(e, x, y))
        .collect();
    Ok(mode.reduce(&powers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::default_emitters;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_mode() {
        assert_eq!(CombineMode::parse("MAX").unwrap(), CombineMode::Max);
        assert_eq!(CombineMode::parse("sum").unwrap(), CombineMode::Sum);
        assert!(matches!(CombineMode::parse("mean"), Err(LinkError::UnknownCombineMode(_))));
    }

    #[test]
    fn test_reduce() {
        assert_eq!(CombineMode::Max.reduce(&[-50.0, -40.0, -60.0]), -40.0);
        // Two equal powers double: +3.01 dB.
        assert_relative_eq!(CombineMode::Sum.reduce(&[-50.0, -50.0]), -50.0 + 10.0 * 2f64.log10(), epsilon = 1e-12);
        assert_eq!(CombineMode::Sum.reduce(&[-70.0]), -70.0);
    }

    #[test]
    fn test_symmetric_pair_adds_three_db_at_origin() {
        let params = PropagationParams::default();
        let pair = [Emitter::new(-50.0, 0.0, 10.0), Emitter::new(50.0, 0.0, 10.0)];
        let max = combined_power_dbm(&params, &pair, CombineMode::Max, 0.0, 0.0).unwrap();
        let sum = combined_power_dbm(&params, &pair, CombineMode::Sum, 0.0, 0.0).unwrap();
        assert_relative_eq!(sum - max, 3.0103, epsilon = 1e-3);
    }

    #[test]
    fn test_symmetric_pair_on_odd_grid() {
        let params = PropagationParams {
            rx_grid_size: 81,
            ..Default::default()
        };
        let pair = [Emitter::new(0.0, -40.0, 10.0), Emitter::new(0.0, 40.0, 10.0)];
        let cancel = CancelToken::new();
        let max = multi_radio_map(&params, &pair, CombineMode::Max, &cancel).unwrap();
        let sum = multi_radio_map(&params, &pair, CombineMode::Sum, &cancel).unwrap();
        let (r, c) = max.nearest_cell(0.0, 0.0);
        assert_eq!((max.xs[c], max.ys[r]), (0.0, 0.0));
        assert_relative_eq!(sum.value(r, c) - max.value(r, c), 3.0103, epsilon = 1e-3);
    }

    #[test]
    fn test_sum_never_below_max() {
        let params = PropagationParams {
            rx_grid_size: 40,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let emitters = default_emitters();
        let max = multi_radio_map(&params, &emitters, CombineMode::Max, &cancel).unwrap();
        let sum = multi_radio_map(&params, &emitters, CombineMode::Sum, &cancel).unwrap();
        for (s, m) in sum.values_dbm.iter().zip(&max.values_dbm) {
            assert!(s >= m);
        }
    }

    #[test]
    fn test_single_emitter_combination_is_identity() {
        let params = PropagationParams {
            rx_grid_size: 16,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let e = Emitter::new(10.0, 20.0, 5.0);
        let single = radio_map(&params, &e, &cancel).unwrap();
        for mode in [CombineMode::Max, CombineMode::Sum] {
            assert_eq!(multi_radio_map(&params, &[e], mode, &cancel).unwrap(), single);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let cancel = CancelToken::new();
        let e = Emitter::new(0.0, 0.0, 10.0);
        let a = radio_map(&PropagationParams { rx_grid_size: 4, ..Default::default() }, &e, &cancel).unwrap();
        let b = radio_map(&PropagationParams { rx_grid_size: 5, ..Default::default() }, &e, &cancel).unwrap();
        assert_eq!(
            combine_maps(vec![a, b], CombineMode::Max),
            Err(LinkError::ShapeMismatch {
                expected: (4, 4),
                actual: (5, 5)
            })
        );
    }

    #[test]
    fn test_empty_emitters_rejected() {
        let params = PropagationParams::default();
        assert!(matches!(
            multi_radio_map(&params, &[], CombineMode::Max, &CancelToken::new()),
            Err(LinkError::InvalidEmitters(_))
        ));
        assert!(combined_power_dbm(&params, &[], CombineMode::Sum, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_emitter_count_counts_toward_cell_limit() {
        let params = PropagationParams {
            rx_grid_size: 4096,
            ..Default::default()
        };
        let one = [Emitter::new(0.0, 0.0, 10.0)];
        params.validate().unwrap();
        let two = [one[0], Emitter::new(10.0, 0.0, 10.0)];
        assert!(matches!(
            multi_radio_map(&params, &two, CombineMode::Max, &CancelToken::new()),
            Err(LinkError::InvalidGrid(_))
        ));
    }
}
