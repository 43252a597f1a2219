//! Demo binary for the store-gateway chunk-loading pipeline.
//!
//! Wires the reference/loader/measurement/preloading/series stages together behind a small CLI,
//! with configuration loading and logging/metrics setup -- the ambient stack a deployable binary
//! needs, without inventing the out-of-scope RPC wire format (`SPEC_FULL.md` §2).

mod config;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use prometheus_client::registry::Registry;
use sg_telemetry::PipelineMetrics;

use crate::config::TopLevelConfig;

/// Runs a self-contained demo of the store-gateway's `Series` chunk-loading pipeline.
#[derive(Debug, Parser)]
#[command(name = "sg_store_gateway", version)]
struct Cli {
    /// Path to a TOML configuration file. Missing file falls back to defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[arg(long, default_value = "sg_store_gateway=info,warn")]
    log_filter: String,

    /// Print the collected metrics as Prometheus text exposition after the run.
    #[arg(long)]
    print_metrics: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    sg_log::setup_logging(&cli.log_filter);

    let config = match &cli.config {
        Some(path) => TopLevelConfig::from_file(path)?,
        None => TopLevelConfig::default(),
    };

    let mut registry = Registry::default();
    let metrics = Arc::new(PipelineMetrics::new(&mut registry));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(demo::run(config, Arc::clone(&metrics)))?;

    if cli.print_metrics {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &registry)?;
        print!("{buf}");
    }

    Ok(())
}
