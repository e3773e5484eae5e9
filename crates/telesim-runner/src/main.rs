//! `telesim` command-line runner.
//!
//! ```text
//! telesim requests.yaml --seed 42 --output results.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use telesim_common::CancelToken;
use telesim_model::load_requests;
use telesim_runner::{run_requests, write_results, RunOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "telesim", version, about = "Link-level and radio-map simulation runner")]
struct Args {
    /// Request file (YAML or JSON).
    file: PathBuf,

    /// Seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Abort any single request after this many seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Directory used for output path hints.
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    /// Suffix for output names (default: timestamp and seed).
    #[arg(long)]
    run_tag: Option<String>,

    /// Write the result documents here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// Per-request budget for `--timeout-secs`. Negative or NaN values are
/// rejected; values beyond what `Duration` holds mean no budget.
fn timeout_from_secs(secs: f64) -> Result<Option<Duration>, f64> {
    if secs.is_nan() || secs < 0.0 {
        return Err(secs);
    }
    Ok(Duration::try_from_secs_f64(secs).ok())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    telesim_metrics::describe_metrics();

    let requests = match load_requests(&args.file) {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let timeout = match args.timeout_secs.map(timeout_from_secs) {
        Some(Ok(timeout)) => timeout,
        Some(Err(secs)) => {
            error!("invalid --timeout-secs {}", secs);
            return ExitCode::FAILURE;
        }
        None => None,
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, cancelling...");
        handler_token.cancel();
    }) {
        warn!("failed to install Ctrl+C handler: {}", e);
    }

    let options = RunOptions {
        seed: args.seed,
        timeout,
        out_dir: args.out_dir,
        run_tag: args.run_tag,
        cancel,
    };

    info!(requests = requests.len(), file = %args.file.display(), "loaded requests");
    let results = run_requests(&requests, &options);
    let failed = results.iter().filter(|r| !r.is_success()).count();

    match &args.output {
        Some(path) => {
            if let Err(e) = write_results(path, &results) {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
            info!(path = %path.display(), "results written");
        }
        None => match serde_json::to_string_pretty(&results) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("failed to serialize results: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    if failed > 0 {
        warn!(failed, total = results.len(), "some requests failed");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
