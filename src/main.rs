use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pollvisor::{LogWriter, PoolConfig, RuntimeError, Subscribe, Supervisor};

/// Supervised pool of self-healing async pollers.
#[derive(Parser, Debug)]
#[command(name = "pollvisor", version, about)]
struct Cli {
    /// TOML pool configuration. Without it, three simulated pollers run.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pollvisor::logging::init_logging();

    let cfg = match &cli.config {
        Some(path) => PoolConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PoolConfig::demo(),
    };
    let pollers = cfg.pollers.clone();

    tracing::info!(
        pollers = pollers.len(),
        grace_ms = cfg.grace.as_millis() as u64,
        "pollvisor starting"
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let sup = Supervisor::builder(cfg).with_subscribers(subs).build();

    match sup.run(pollers).await {
        Ok(()) => {}
        Err(err @ RuntimeError::GraceExceeded { .. }) => {
            tracing::warn!(error = %err, "forced termination of stuck workers");
        }
        Err(err) => return Err(err).context("supervisor failed"),
    }

    tracing::info!("pollvisor exited");
    Ok(())
}
