use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use metronome_core::sink::{FileSink, LogSink, StdoutSink};
use metronome_core::{Clock, MetronomeConfig};
use metronome_discovery::{
    ApiDiscovery, DbDiscovery, DiscoveryAdapter, FileDiscovery, MockDiscovery, RpcDiscovery,
};
use metronome_runner::{ApiRunner, MockRunner, RpcRunner, RunnerAdapter};
use metronome_scheduler::SchedulerEngine;

#[derive(Parser)]
#[command(name = "metronome", about = "Minute-tick job scheduler")]
struct Cli {
    /// Path to metronome.toml (defaults to ./metronome.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metronome=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: explicit path > METRONOME_CONFIG env > ./metronome.toml
    let config_path = cli.config.or_else(|| std::env::var("METRONOME_CONFIG").ok());
    let config = MetronomeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        MetronomeConfig::default()
    });

    let clock = Clock::new(config.time.use_utc);
    let sink = build_sink(&config);
    let runner = build_runner(&config);
    // A backend store that cannot be opened is the one fatal startup error.
    let discovery = build_discovery(&config, runner, clock)?;

    let engine = SchedulerEngine::new(discovery, sink, clock);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, stopping");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    Ok(())
}

/// Runner precedence: rpc > api > the failsafe mock.
fn build_runner(config: &MetronomeConfig) -> Box<dyn RunnerAdapter> {
    if config.runner.use_rpc {
        info!("runner: RPC");
        return Box::new(RpcRunner);
    }
    if config.runner.use_api {
        info!("runner: API");
        return Box::new(ApiRunner::new());
    }
    info!("runner: mock");
    Box::new(MockRunner)
}

/// Discovery precedence: file > database > api > rpc > the failsafe mock.
fn build_discovery(
    config: &MetronomeConfig,
    runner: Box<dyn RunnerAdapter>,
    clock: Clock,
) -> anyhow::Result<Arc<dyn DiscoveryAdapter>> {
    if let Some(ref path) = config.discovery.job_file {
        info!(path = %path, "discovery: file");
        return Ok(Arc::new(FileDiscovery::new(path, runner, clock)));
    }
    if let Some(ref db) = config.discovery.database {
        info!(path = %db.path, "discovery: database");
        ensure_parent_dir(&db.path);
        return Ok(Arc::new(DbDiscovery::open(&db.path, runner, clock)?));
    }
    if let Some(ref api) = config.discovery.api {
        info!(get_url = %api.get_url, "discovery: api");
        return Ok(Arc::new(ApiDiscovery::new(
            &api.get_url,
            &api.complete_url,
            runner,
            clock,
        )));
    }
    if let Some(ref rpc) = config.discovery.rpc {
        info!(url = %rpc.url, "discovery: rpc");
        return Ok(Arc::new(RpcDiscovery::new(&rpc.url, runner, clock)));
    }
    info!("discovery: mock");
    Ok(Arc::new(MockDiscovery::new(runner)))
}

fn build_sink(config: &MetronomeConfig) -> Arc<dyn LogSink> {
    match config.logging.file {
        Some(ref path) => Arc::new(FileSink::new(path.clone())),
        None => Arc::new(StdoutSink),
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
