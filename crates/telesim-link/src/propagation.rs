//! Free-space-plus-exponent propagation over a rectangular grid.
//!
//! Received power at a point is
//!
//! ```text
//! P_rx(x, y) = P_tx - [20·log10(4π/λ) + 10·n·log10(d + ε)]
//! ```
//!
//! with `λ = c / f`, `n` the pathloss exponent and `d` the 3-D distance from
//! the emitter to a receiver at height `rx_height_m`.

use crate::LinkError;
use std::f64::consts::PI;
use telesim_common::CancelToken;

/// Speed of light used for the wavelength (m/s).
pub const SPEED_OF_LIGHT_M_S: f64 = 3e8;

/// Offset added to the distance so the emitter's own location stays finite.
pub const DISTANCE_EPSILON_M: f64 = 1e-6;

/// Largest number of cells a map may hold (4096 x 4096).
pub const MAX_GRID_CELLS: usize = 1 << 24;

// ============================================================================
// Emitters and Parameters
// ============================================================================

/// Emitter position in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Emitter {
    pub x: f64,
    pub y: f64,
    /// Antenna height.
    pub z: f64,
}

impl Emitter {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinates as `[x, y, z]`.
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.x.is_finite() && self.y.is_finite() && self.z.is_finite() {
            Ok(())
        } else {
            Err(LinkError::InvalidEmitters(format!(
                "non-finite emitter position ({}, {}, {})",
                self.x, self.y, self.z
            )))
        }
    }
}

impl From<[f64; 3]> for Emitter {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Emitters used for multi-emitter maps when a request names none.
pub fn default_emitters() -> Vec<Emitter> {
    vec![
        Emitter::new(0.0, 0.0, 10.0),
        Emitter::new(60.0, 0.0, 10.0),
        Emitter::new(-60.0, 0.0, 10.0),
    ]
}

/// Grid and radio parameters shared by single- and multi-emitter maps.
///
/// # Example
///
/// ```
/// use telesim_link::PropagationParams;
///
/// let params = PropagationParams::default();
/// assert_eq!(params.rx_grid_size, 80);
/// assert_eq!(params.area_size_m, (200.0, 200.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropagationParams {
    /// Points per axis.
    pub rx_grid_size: usize,
    /// Area extent (width, height) in meters, centred on the origin.
    pub area_size_m: (f64, f64),
    /// Carrier frequency in Hz.
    pub frequency_hz: f64,
    /// Emitted power in dBm.
    pub tx_power_dbm: f64,
    /// Pathloss exponent.
    pub pathloss_exp: f64,
    /// Receiver height in meters.
    pub rx_height_m: f64,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            rx_grid_size: 80,
            area_size_m: (200.0, 200.0),
            frequency_hz: 3.5e9,
            tx_power_dbm: 30.0,
            pathloss_exp: 2.2,
            rx_height_m: 0.0,
        }
    }
}

impl PropagationParams {
    /// Reject parameters that would produce an empty or non-finite map.
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.rx_grid_size == 0 {
            return Err(LinkError::InvalidGrid("rx_grid_size must be positive".to_string()));
        }
        match self.rx_grid_size.checked_mul(self.rx_grid_size) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(LinkError::InvalidGrid(format!(
                    "rx_grid_size {} exceeds {} cells",
                    self.rx_grid_size, MAX_GRID_CELLS
                )))
            }
        }
        let (w, h) = self.area_size_m;
        if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            return Err(LinkError::InvalidGrid(format!(
                "area_size must be positive, got ({}, {})",
                w, h
            )));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(LinkError::InvalidParameter(format!(
                "frequency_hz must be positive, got {}",
                self.frequency_hz
            )));
        }
        if !self.tx_power_dbm.is_finite() {
            return Err(LinkError::InvalidParameter("tx_power_dbm must be finite".to_string()));
        }
        if !self.pathloss_exp.is_finite() || self.pathloss_exp < 0.0 {
            return Err(LinkError::InvalidParameter(format!(
                "pathloss_exp must be non-negative, got {}",
                self.pathloss_exp
            )));
        }
        if !self.rx_height_m.is_finite() {
            return Err(LinkError::InvalidParameter("rx_height_m must be finite".to_string()));
        }
        Ok(())
    }

    /// Carrier wavelength in meters.
    pub fn wavelength_m(&self) -> f64 {
        SPEED_OF_LIGHT_M_S / self.frequency_hz
    }

    /// Distance-independent part of the loss, `20·log10(4π/λ)`.
    pub fn fspl_constant_db(&self) -> f64 {
        20.0 * (4.0 * PI / self.wavelength_m()).log10()
    }

    /// Path loss in dB at 3-D distance `distance_m`.
    pub fn path_loss_db(&self, distance_m: f64) -> f64 {
        self.fspl_constant_db() + 10.0 * self.pathloss_exp * (distance_m + DISTANCE_EPSILON_M).log10()
    }

    /// Received power (dBm) at `(x, y)` from one emitter.
    pub fn received_power_dbm(&self, emitter: &Emitter, x: f64, y: f64) -> f64 {
        let dx = x - emitter.x;
        let dy = y - emitter.y;
        let dz = emitter.z - self.rx_height_m;
        let d = (dx * dx + dy * dy + dz * dz).sqrt();
        self.tx_power_dbm - self.path_loss_db(d)
    }

    /// Sample coordinates along x.
    pub fn xs(&self) -> Vec<f64> {
        linspace(-self.area_size_m.0 / 2.0, self.area_size_m.0 / 2.0, self.rx_grid_size)
    }

    /// Sample coordinates along y.
    pub fn ys(&self) -> Vec<f64> {
        linspace(-self.area_size_m.1 / 2.0, self.area_size_m.1 / 2.0, self.rx_grid_size)
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// A single sample sits at `start`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

// ============================================================================
// Power Map Grid
// ============================================================================

/// Received power over a grid. Rows follow `ys`, columns follow `xs`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerMapGrid {
    /// Column coordinates.
    pub xs: Vec<f64>,
    /// Row coordinates.
    pub ys: Vec<f64>,
    /// Row-major power values in dBm, `ys.len() x xs.len()`.
    pub values_dbm: Vec<f64>,
}

/// Summary statistics of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapSummary {
    pub max_power_dbm: f64,
    pub min_power_dbm: f64,
    pub mean_power_dbm: f64,
    /// `(x, y)` of the strongest cell.
    pub peak_xy: (f64, f64),
}

impl PowerMapGrid {
    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.ys.len(), self.xs.len())
    }

    /// Value at `(row, col)`.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values_dbm[row * self.xs.len() + col]
    }

    /// One row of the map.
    pub fn row(&self, row: usize) -> &[f64] {
        let cols = self.xs.len();
        &self.values_dbm[row * cols..(row + 1) * cols]
    }

    /// `(row, col)` of the cell closest to `(x, y)`.
    pub fn nearest_cell(&self, x: f64, y: f64) -> (usize, usize) {
        (nearest_index(&self.ys, y), nearest_index(&self.xs, x))
    }

    /// `(row, col)` of the maximum value. Ties keep the first cell.
    pub fn argmax(&self) -> (usize, usize) {
        let cols = self.xs.len();
        let mut best = 0;
        for (i, v) in self.values_dbm.iter().enumerate() {
            if *v > self.values_dbm[best] {
                best = i;
            }
        }
        (best / cols, best % cols)
    }

    pub fn summary(&self) -> MapSummary {
        let (row, col) = self.argmax();
        let n = self.values_dbm.len() as f64;
        MapSummary {
            max_power_dbm: self.value(row, col),
            min_power_dbm: self.values_dbm.iter().copied().fold(f64::INFINITY, f64::min),
            mean_power_dbm: self.values_dbm.iter().sum::<f64>() / n,
            peak_xy: (self.xs[col], self.ys[row]),
        }
    }
}

fn nearest_index(axis: &[f64], v: f64) -> usize {
    let mut best = 0;
    for (i, a) in axis.iter().enumerate() {
        if (a - v).abs() < (axis[best] - v).abs() {
            best = i;
        }
    }
    best
}

/// Evaluate one emitter over the grid described by `params`.
///
/// The token is checked once per row.
pub fn radio_map(
    params: &PropagationParams,
    emitter: &Emitter,
    cancel: &CancelToken,
) -> Result<PowerMapGrid, LinkError> {
    params.validate()?;
    emitter.validate()?;

    let xs = params.xs();
    let ys = params.ys();
    let mut values_dbm = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        cancel.check()?;
        values_dbm.extend(xs.iter().map(|&x| params.received_power_dbm(emitter, x, y)));
    }
    Ok(PowerMapGrid { xs, ys, values_dbm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_params() {
        let params = PropagationParams::default();
        assert_eq!(params.rx_grid_size, 80);
        assert_eq!(params.frequency_hz, 3.5e9);
        assert_eq!(params.tx_power_dbm, 30.0);
        assert_eq!(params.pathloss_exp, 2.2);
        assert_eq!(params.rx_height_m, 0.0);
        params.validate().unwrap();
    }

    #[test]
    fn test_free_space_reference_value() {
        // Exponent 2 reduces to Friis: 1 km at 3.5 GHz is ~103.3 dB.
        let params = PropagationParams {
            pathloss_exp: 2.0,
            ..Default::default()
        };
        assert_relative_eq!(params.path_loss_db(1000.0), 103.32, epsilon = 0.01);
    }

    #[test]
    fn test_power_at_emitter_is_finite() {
        let params = PropagationParams::default();
        let emitter = Emitter::new(5.0, -3.0, 0.0);
        assert!(params.received_power_dbm(&emitter, 5.0, -3.0).is_finite());
    }

    #[test]
    fn test_power_non_increasing_with_distance() {
        let params = PropagationParams::default();
        let emitter = Emitter::new(0.0, 0.0, 10.0);
        let mut last = f64::INFINITY;
        for i in 0..200 {
            let p = params.received_power_dbm(&emitter, i as f64 * 0.7, i as f64 * 0.3);
            assert!(p <= last);
            last = p;
        }
    }

    #[test]
    fn test_grid_peak_at_emitter_cell() {
        let params = PropagationParams::default();
        let grid = radio_map(&params, &Emitter::new(0.0, 0.0, 10.0), &CancelToken::new()).unwrap();
        assert_eq!(grid.shape(), (80, 80));
        let nearest = grid.nearest_cell(0.0, 0.0);
        let max = grid.summary().max_power_dbm;
        assert_relative_eq!(grid.value(nearest.0, nearest.1), max, epsilon = 1e-9);
    }

    #[test]
    fn test_rows_follow_y() {
        let params = PropagationParams {
            rx_grid_size: 11,
            ..Default::default()
        };
        let grid = radio_map(&params, &Emitter::new(0.0, 80.0, 10.0), &CancelToken::new()).unwrap();
        let (row, col) = grid.argmax();
        assert_eq!(grid.ys[row], 80.0);
        assert_eq!(grid.xs[col], 0.0);
        assert_eq!(grid.summary().peak_xy, (0.0, 80.0));
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(-1.0, 1.0, 5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(-1.0, 1.0, 1), vec![-1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let cancel = CancelToken::new();
        let e = Emitter::new(0.0, 0.0, 10.0);
        let zero = PropagationParams { rx_grid_size: 0, ..Default::default() };
        assert!(matches!(radio_map(&zero, &e, &cancel), Err(LinkError::InvalidGrid(_))));
        let flat = PropagationParams { area_size_m: (0.0, 10.0), ..Default::default() };
        assert!(matches!(radio_map(&flat, &e, &cancel), Err(LinkError::InvalidGrid(_))));
        for size in [4097, usize::MAX] {
            let huge = PropagationParams { rx_grid_size: size, ..Default::default() };
            assert!(matches!(huge.validate(), Err(LinkError::InvalidGrid(_))), "size {}", size);
        }
        let largest = PropagationParams { rx_grid_size: 4096, ..Default::default() };
        assert!(largest.validate().is_ok());
        let freq = PropagationParams { frequency_hz: -1.0, ..Default::default() };
        assert!(matches!(radio_map(&freq, &e, &cancel), Err(LinkError::InvalidParameter(_))));
        let bad = Emitter::new(f64::NAN, 0.0, 0.0);
        assert!(matches!(
            radio_map(&PropagationParams::default(), &bad, &cancel),
            Err(LinkError::InvalidEmitters(_))
        ));
    }

    #[test]
    fn test_cancelled_map() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            radio_map(&PropagationParams::default(), &Emitter::new(0.0, 0.0, 1.0), &cancel),
            Err(LinkError::Cancelled(_))
        ));
    }
}
