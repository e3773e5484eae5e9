//! The uniform result returned for every request.

use crate::error::RunnerError;
use serde::Serialize;
use serde_json::{Map, Value};
use telesim_ber::BerCurve;
use telesim_link::PowerMapGrid;
use telesim_phy::Complex64;

/// Outcome of one request.
///
/// On failure `plots` and `kpis` are empty, `data` is absent and `error`
/// holds the message. Callers branch on `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Task tag of the request that produced this result.
    pub task: String,
    /// Output path hints.
    pub plots: Vec<String>,
    /// Scalar and per-point figures of merit.
    pub kpis: Map<String, Value>,
    /// Numeric arrays behind the plots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Classification of `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl SimulationResult {
    pub(crate) fn success(task: &str, plots: Vec<String>, kpis: Map<String, Value>, data: ResultData) -> Self {
        Self {
            task: task.to_string(),
            plots,
            kpis,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub(crate) fn failure(task: &str, err: &RunnerError) -> Self {
        Self {
            task: task.to_string(),
            plots: Vec::new(),
            kpis: Map::new(),
            data: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().as_str().to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Look up a KPI.
    pub fn kpi(&self, name: &str) -> Option<&Value> {
        self.kpis.get(name)
    }
}

/// Numeric payload of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultData {
    /// Received samples and the ideal points, as `[re, im]` pairs.
    Constellation {
        samples: Vec<[f64; 2]>,
        ideal: Vec<[f64; 2]>,
    },
    /// One BER curve with an optional analytical SER reference.
    BerCurve {
        curve: BerCurve,
        #[serde(skip_serializing_if = "Option::is_none")]
        ser_theory: Option<Vec<f64>>,
    },
    /// One curve per antenna layout.
    MimoCurves { curves: Vec<BerCurve> },
    /// Received power in dBm, rows indexed by y.
    RadioMap { grid: PowerMapGrid },
}

pub(crate) fn iq_pairs(points: &[Complex64]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.re, p.im]).collect()
}

/// Unwrap a `json!({...})` literal into its map.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
