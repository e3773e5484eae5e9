//! # telesim-link
//!
//! Analytical received-power maps.
//!
//! ## Features
//!
//! - **Propagation**: free-space loss with a configurable pathloss exponent,
//!   evaluated at a point or over a centred rectangular grid
//! - **Multi-emitter maps**: per-emitter grids reduced by strongest server
//!   (`max`) or aggregate linear power (`sum`)

mod combine;
mod error;
mod propagation;

pub use combine::{combine_maps, combined_power_dbm, multi_radio_map, CombineMode};
pub use error::LinkError;
pub use propagation::{
    default_emitters, linspace, radio_map, Emitter, MapSummary, PowerMapGrid, PropagationParams,
    DISTANCE_EPSILON_M, MAX_GRID_CELLS, SPEED_OF_LIGHT_M_S,
};

use telesim_metrics::{metric_defs, RunLabels};

/// Emit grid metrics for a finished map.
pub fn record_map(task: &str, grid: &PowerMapGrid, emitters: usize) {
    let labels = RunLabels::new(task).to_labels();
    let cells = (grid.values_dbm.len() * emitters) as u64;
    metrics::counter!(metric_defs::RADIO_GRID_CELLS.name, labels.as_slice()).increment(cells);
    metrics::histogram!(metric_defs::RADIO_EMITTERS.name, labels.as_slice()).record(emitters as f64);
}
