//! # telesim-runner
//!
//! The engine boundary. A [`SimulationRequest`] goes in, a
//! [`SimulationResult`] comes out; pipeline errors are classified and
//! reported inside the result rather than returned.
//!
//! ```rust,no_run
//! use telesim_model::{BerParams, SimulationRequest};
//! use telesim_runner::{run_request, RunOptions};
//!
//! let request = SimulationRequest::Ber(BerParams::default());
//! let result = run_request(&request, &RunOptions::seeded(42));
//! assert!(result.is_success());
//! ```
//!
//! [`SimulationRequest`]: telesim_model::SimulationRequest

mod engine;
mod error;
mod result;

pub use engine::{run_request, run_requests, RunOptions};
pub use error::{ErrorKind, RunnerError};
pub use result::{ResultData, SimulationResult};

use std::path::Path;

/// Write results as JSON, or YAML when the path ends in `.yaml`/`.yml`.
pub fn write_results(path: &Path, results: &[SimulationResult]) -> Result<(), RunnerError> {
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let text = if yaml {
        serde_yaml::to_string(results).map_err(|e| RunnerError::Serialize(e.to_string()))?
    } else {
        serde_json::to_string_pretty(results).map_err(|e| RunnerError::Serialize(e.to_string()))?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RunnerError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| RunnerError::Io {
        path: path.to_path_buf(),
        source,
    })
}
