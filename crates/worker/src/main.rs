//! `ripline-acquire <manifest-path>`
//!
//! Acquisition worker process. Speaks the worker protocol on stdin/stdout
//! and logs to stderr.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ripline_core::acquisition::{
    locate_fetch_tool, AcquisitionWorker, LineChannel, WorkerChannel, YtDlpFetcher,
};
use ripline_core::{load_config_or_default, WorkerMessage};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(manifest_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: ripline-acquire <manifest-path>");
    };

    let config_path = std::env::var("RIPLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let (config, from_file) = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if !from_file {
        warn!("No config at {:?}, using defaults", config_path);
    }

    let mut channel = LineChannel::new(tokio::io::stdin(), tokio::io::stdout());

    let tool_path = match locate_fetch_tool(&config.fetch, &config.paths.bin_dir()).await {
        Ok(path) => path,
        Err(e) => {
            let _ = channel.send(WorkerMessage::error(e.to_string())).await;
            return Err(e).context("Could not locate fetch tool");
        }
    };
    info!("Using fetch tool {}", tool_path.display());

    let mut worker = AcquisitionWorker::new(YtDlpFetcher::new(tool_path), config.fetch.clone());
    if let Some(cookies) = std::env::var_os("RIPLINE_COOKIES_PATH") {
        worker = worker.with_cookies_path(PathBuf::from(cookies));
    }

    let summary = worker
        .serve(&manifest_path, &mut channel)
        .await
        .with_context(|| format!("Acquisition of {:?} failed", manifest_path))?;
    info!(
        "Acquired {}/{} unit(s), {} failed, {} credential refresh(es)",
        summary.completed, summary.total, summary.failed, summary.refreshes
    );
    Ok(())
}
