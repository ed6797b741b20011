//! Forecast frame builder.
//!
//! One invocation per schedule tick:
//! - Discovers the newest published run of each configured model
//! - Renders only the forecast hours not yet recorded for that run
//! - Persists the status file once, atomically, at the end

mod config;
mod discovery;
mod pipeline;
mod reconciler;
mod render;
mod scheduler;
mod state;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grib_source::{HttpGribSource, HttpSourceConfig};

use discovery::{DiscoveryConfig, SystemClock, DEFAULT_LATENCY_BUFFER_HOURS, DEFAULT_PROBE_CANDIDATES};
use render::PngRenderer;
use scheduler::{
    Scheduler, SchedulerConfig, DEFAULT_MAX_CONCURRENT_FRAMES, DEFAULT_MAX_CONCURRENT_MODELS,
};
use state::StateStore;

#[derive(Parser, Debug)]
#[command(name = "frame-builder")]
#[command(about = "Discover the newest NWP runs and render new forecast frames")]
struct Args {
    /// Configuration directory (contains variables.yaml and models/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Status file recording produced frames
    #[arg(long, env = "STATUS_FILE", default_value = "output/status.json")]
    status_file: PathBuf,

    /// Root directory for rendered frames
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Only process these models (repeatable; default: all enabled)
    #[arg(short, long)]
    model: Vec<String>,

    /// Initialization cycles probed per model, newest first
    #[arg(long, env = "PROBE_CANDIDATES", default_value_t = DEFAULT_PROBE_CANDIDATES)]
    probe_candidates: u32,

    /// Hours subtracted from the current hour before probing hourly models
    #[arg(long, env = "LATENCY_BUFFER_HOURS", default_value_t = DEFAULT_LATENCY_BUFFER_HOURS)]
    latency_buffer_hours: u32,

    /// Models processed concurrently
    #[arg(long, env = "MAX_CONCURRENT_MODELS", default_value_t = DEFAULT_MAX_CONCURRENT_MODELS)]
    max_concurrent_models: usize,

    /// Forecast hours processed concurrently within a model
    #[arg(long, env = "MAX_CONCURRENT_FRAMES", default_value_t = DEFAULT_MAX_CONCURRENT_FRAMES)]
    max_concurrent_frames: usize,

    /// Wall-clock budget for the whole invocation
    #[arg(long, env = "DEADLINE_SECS", default_value = "3000")]
    deadline_secs: u64,

    /// Write Prometheus metrics here on exit
    #[arg(long, env = "METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let started = tokio::time::Instant::now();
    let deadline = started + Duration::from_secs(args.deadline_secs);

    let prometheus = telemetry::install()?;

    info!(
        config_dir = %args.config_dir.display(),
        status_file = %args.status_file.display(),
        output_dir = %args.output_dir.display(),
        "Starting frame builder"
    );

    let catalog = Arc::new(config::load_catalog(&args.config_dir)?);
    let source = Arc::new(HttpGribSource::new(HttpSourceConfig::default()).context("Failed to build HTTP client")?);
    let renderer = Arc::new(PngRenderer::new(&args.output_dir));

    let scheduler = Scheduler::new(
        catalog,
        source,
        renderer,
        Arc::new(SystemClock),
        SchedulerConfig {
            discovery: DiscoveryConfig {
                candidates: args.probe_candidates,
                latency_buffer_hours: args.latency_buffer_hours,
            },
            max_concurrent_models: args.max_concurrent_models,
            max_concurrent_frames: args.max_concurrent_frames,
        },
    );

    let store = StateStore::new(&args.status_file);
    let status = scheduler.run(store.load(), &args.model, deadline).await;

    let saved = store.save(&status);
    if let Err(e) = &saved {
        error!(error = %e, "Failed to persist status file");
    }

    if let Some(path) = &args.metrics_file {
        metrics::gauge!("frame_builder_last_run_seconds").set(started.elapsed().as_secs_f64());
        metrics::gauge!("frame_builder_last_run_success").set(if saved.is_ok() { 1.0 } else { 0.0 });
        if let Err(e) = telemetry::write_textfile(&prometheus, path) {
            error!(error = %e, "Failed to write metrics textfile");
        }
    }

    saved.context("Status file could not be written")?;
    info!(elapsed_secs = started.elapsed().as_secs(), "Frame builder finished");
    Ok(())
}
