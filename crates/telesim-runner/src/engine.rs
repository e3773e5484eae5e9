//! Request dispatch.
//!
//! [`run_request`] is the engine boundary: every error raised by a pipeline
//! is caught here and turned into a failure [`SimulationResult`].

use crate::error::RunnerError;
use crate::result::{iq_pairs, object, ResultData, SimulationResult};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use telesim_ber::{simulate_constellation, simulate_link_ber, simulate_mimo_ber, MIMO_NOTE};
use telesim_common::{resolve_seed, seeded_rng, CancelToken};
use telesim_link::{multi_radio_map, radio_map, record_map, MapSummary, PropagationParams};
use telesim_metrics::{metric_defs, RunLabels};
use telesim_model::{
    BerParams, ConstellationParams, MimoParams, MultiRadioMapParams, RadioMapParams, SimulationRequest,
};
use tracing::{info, warn};

/// Options shared by every request of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Seed for the random source; drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Wall-clock budget per request.
    pub timeout: Option<Duration>,
    /// Directory used for output path hints.
    pub out_dir: PathBuf,
    /// Suffix making output names unique; defaults to a timestamp and the seed.
    pub run_tag: Option<String>,
    /// Run-wide cancellation flag.
    pub cancel: CancelToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: None,
            timeout: None,
            out_dir: PathBuf::from("output"),
            run_tag: None,
            cancel: CancelToken::new(),
        }
    }
}

impl RunOptions {
    /// Options with a fixed seed and defaults elsewhere.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

/// Per-request context resolved from [`RunOptions`].
struct RunContext {
    seed: u64,
    tag: String,
    out_dir: PathBuf,
    cancel: CancelToken,
}

impl RunContext {
    /// `index` is the request's position in a batch; it keeps path hints
    /// of same-task requests in one run apart.
    fn new(options: &RunOptions, index: Option<usize>) -> Self {
        let seed = resolve_seed(options.seed);
        let base = options
            .run_tag
            .clone()
            .unwrap_or_else(|| format!("{}_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"), seed));
        let tag = match index {
            Some(i) => format!("{}_{}", base, i + 1),
            None => base,
        };
        let cancel = match options.timeout {
            Some(timeout) => options.cancel.child_with_timeout(timeout),
            None => options.cancel.clone(),
        };
        Self {
            seed,
            tag,
            out_dir: options.out_dir.clone(),
            cancel,
        }
    }

    fn plot_path(&self, stem: &str) -> String {
        self.out_dir
            .join(format!("{}_{}.png", stem, self.tag))
            .display()
            .to_string()
    }
}

struct Success {
    plots: Vec<String>,
    kpis: Map<String, Value>,
    data: ResultData,
}

/// Run one request to completion. Never fails; errors become failure results.
pub fn run_request(request: &SimulationRequest, options: &RunOptions) -> SimulationResult {
    run_in_context(request, RunContext::new(options, None))
}

/// Run requests in order with the same options.
///
/// Each request's tag carries its 1-based position (`<tag>_<n>`).
pub fn run_requests(requests: &[SimulationRequest], options: &RunOptions) -> Vec<SimulationResult> {
    requests
        .iter()
        .enumerate()
        .map(|(i, r)| run_in_context(r, RunContext::new(options, Some(i))))
        .collect()
}

fn run_in_context(request: &SimulationRequest, ctx: RunContext) -> SimulationResult {
    let task = request.task();
    info!(task, seed = ctx.seed, tag = %ctx.tag, "running request");

    let started = Instant::now();
    let outcome = match request {
        SimulationRequest::Constellation(p) => run_constellation(p, &ctx),
        SimulationRequest::Ber(p) => run_ber(p, &ctx),
        SimulationRequest::MimoComparison(p) => run_mimo(p, &ctx),
        SimulationRequest::RadioMap(p) => run_radio_map(p, &ctx),
        SimulationRequest::MultiRadioMap(p) => run_multi_radio_map(p, &ctx),
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let labels = RunLabels::new(task);
    metrics::histogram!(metric_defs::REQUEST_WALL_TIME.name, labels.to_labels().as_slice()).record(elapsed_ms);

    match outcome {
        Ok(success) => {
            info!(task, elapsed_ms, plots = success.plots.len(), "request finished");
            let outcome = labels.with(&[("outcome", "ok".to_string())]);
            metrics::counter!(metric_defs::REQUESTS.name, outcome.as_slice()).increment(1);
            SimulationResult::success(task, success.plots, success.kpis, success.data)
        }
        Err(err) => {
            let kind = err.kind();
            warn!(task, kind = %kind, error = %err, "request failed");
            let outcome = labels.with(&[("outcome", kind.as_str().to_string())]);
            metrics::counter!(metric_defs::REQUESTS.name, outcome.as_slice()).increment(1);
            SimulationResult::failure(task, &err)
        }
    }
}

// ============================================================================
// Pipelines
// ============================================================================

fn run_constellation(params: &ConstellationParams, ctx: &RunContext) -> Result<Success, RunnerError> {
    let config = params.to_config()?;
    let mut rng = seeded_rng(ctx.seed);
    let result = simulate_constellation(&config, &mut rng, &ctx.cancel)?;

    let stem = format!("constellation_{}_{:.1}db", config.modulation.label(), config.snr_db);
    let kpis = object(json!({
        "modulation": config.modulation.label(),
        "snr_db": config.snr_db,
        "n_symbols": config.n_symbols,
        "noise_variance": result.noise_variance,
        "evm_rms": result.evm_rms,
        "seed": ctx.seed,
    }));
    Ok(Success {
        plots: vec![ctx.plot_path(&stem)],
        kpis,
        data: ResultData::Constellation {
            samples: iq_pairs(&result.samples),
            ideal: iq_pairs(&result.ideal),
        },
    })
}

fn run_ber(params: &BerParams, ctx: &RunContext) -> Result<Success, RunnerError> {
    let config = params.to_config()?;
    let mut rng = seeded_rng(ctx.seed);
    let result = simulate_link_ber(&config, &mut rng, &ctx.cancel)?;

    let curve = &result.curve;
    let stem = format!("ber_{}_{}", config.modulation.label(), config.channel.label());
    let mut kpis = object(json!({
        "modulation": config.modulation.label(),
        "channel": config.channel.label(),
        "demapper": config.demapper.label(),
        "snr_db": curve.snr_db(),
        "ber": curve.ber(),
        "ser": curve.ser(),
        "bits": curve.points.iter().map(|p| p.bits).collect::<Vec<_>>(),
        "seed": ctx.seed,
    }));
    if let Some(theory) = &result.ser_theory {
        kpis.insert("ser_theory".to_string(), json!(theory));
    }
    Ok(Success {
        plots: vec![ctx.plot_path(&stem)],
        kpis,
        data: ResultData::BerCurve {
            curve: result.curve,
            ser_theory: result.ser_theory,
        },
    })
}

fn run_mimo(params: &MimoParams, ctx: &RunContext) -> Result<Success, RunnerError> {
    let config = params.to_config()?;
    let mut rng = seeded_rng(ctx.seed);
    let result = simulate_mimo_ber(&config, &mut rng, &ctx.cancel)?;

    let ber: Map<String, Value> = result
        .curves
        .iter()
        .map(|c| (c.label.clone(), json!(c.ber())))
        .collect();
    let configs: Vec<Value> = config
        .configs
        .iter()
        .map(|a| json!({ "nt": a.nt, "nr": a.nr }))
        .collect();
    let kpis = object(json!({
        "modulation": config.modulation.label(),
        "configs": configs,
        "snr_db": config.snr_db,
        "ber": ber,
        "combining": config.combining.label(),
        "note": MIMO_NOTE,
        "seed": ctx.seed,
    }));
    Ok(Success {
        plots: vec![ctx.plot_path(&format!("ber_mimo_{}", config.modulation.label()))],
        kpis,
        data: ResultData::MimoCurves { curves: result.curves },
    })
}

fn propagation_kpis(params: &PropagationParams, summary: &MapSummary) -> Map<String, Value> {
    object(json!({
        "rx_grid_size": params.rx_grid_size,
        "area_size": [params.area_size_m.0, params.area_size_m.1],
        "frequency_hz": params.frequency_hz,
        "tx_power_dbm": params.tx_power_dbm,
        "pathloss_exp": params.pathloss_exp,
        "max_power_dbm": summary.max_power_dbm,
        "min_power_dbm": summary.min_power_dbm,
        "mean_power_dbm": summary.mean_power_dbm,
        "peak_xy": [summary.peak_xy.0, summary.peak_xy.1],
    }))
}

fn run_radio_map(params: &RadioMapParams, ctx: &RunContext) -> Result<Success, RunnerError> {
    let propagation = params.propagation()?;
    let emitter = params.emitter();
    let grid = radio_map(&propagation, &emitter, &ctx.cancel)?;
    record_map("radiomap", &grid, 1);

    let mut kpis = propagation_kpis(&propagation, &grid.summary());
    kpis.insert("tx_pos".to_string(), json!(emitter.to_array()));
    Ok(Success {
        plots: vec![ctx.plot_path("radio_map_single_tx")],
        kpis,
        data: ResultData::RadioMap { grid },
    })
}

fn run_multi_radio_map(params: &MultiRadioMapParams, ctx: &RunContext) -> Result<Success, RunnerError> {
    let propagation = params.propagation()?;
    let emitters = params.emitters()?;
    let mode = params.mode()?;
    let grid = multi_radio_map(&propagation, &emitters, mode, &ctx.cancel)?;
    record_map("multi_radio_map", &grid, emitters.len());

    let mut kpis = propagation_kpis(&propagation, &grid.summary());
    let positions: Vec<[f64; 3]> = emitters.iter().map(|e| e.to_array()).collect();
    kpis.insert("tx_positions".to_string(), json!(positions));
    kpis.insert("combine_mode".to_string(), json!(mode.label()));
    Ok(Success {
        plots: vec![ctx.plot_path("radio_map_multi_tx")],
        kpis,
        data: ResultData::RadioMap { grid },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_path_uses_tag() {
        let options = RunOptions {
            seed: Some(3),
            out_dir: PathBuf::from("plots"),
            run_tag: Some("t1".into()),
            ..Default::default()
        };
        let ctx = RunContext::new(&options, None);
        assert_eq!(ctx.seed, 3);
        assert_eq!(
            PathBuf::from(ctx.plot_path("radio_map_single_tx")),
            PathBuf::from("plots").join("radio_map_single_tx_t1.png")
        );
    }

    #[test]
    fn test_batch_position_extends_tag() {
        let options = RunOptions {
            run_tag: Some("t1".into()),
            ..RunOptions::seeded(3)
        };
        assert_eq!(RunContext::new(&options, Some(0)).tag, "t1_1");
        assert_eq!(RunContext::new(&options, Some(9)).tag, "t1_10");
        assert!(RunContext::new(&RunOptions::seeded(5), Some(1)).tag.ends_with("_5_2"));
    }

    #[test]
    fn test_default_tag_contains_seed() {
        let ctx = RunContext::new(&RunOptions::seeded(987654), None);
        assert!(ctx.tag.ends_with("_987654"));
    }

    #[test]
    fn test_timeout_applies_per_request() {
        let options = RunOptions {
            seed: Some(1),
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let ctx = RunContext::new(&options, None);
        assert!(ctx.cancel.is_cancelled());
        assert!(!options.cancel.is_cancelled());
    }
}
