//! Asset acquisition: the worker process logic, its retry protocol and the
//! parent-side launchers.

mod channel;
mod config;
mod error;
mod fetch;
mod launcher;
mod locate;
mod retry;
mod worker;

pub use channel::{memory_pair, LineChannel, MemoryChannel, WorkerChannel};
pub use config::FetchConfig;
pub use error::AcquisitionError;
pub use fetch::{
    build_fetch_args, is_playlist_url, output_path, parse_progress, safe_title, FetchError,
    FetchRequest, FetchTool, YtDlpFetcher,
};
pub use launcher::{
    relay_worker, AcquisitionContext, AcquisitionLauncher, AcquisitionReport, InProcessLauncher,
    ProcessLauncher,
};
pub use locate::{download_fetch_tool, locate_fetch_tool, release_asset_name};
pub use retry::{is_authorization_expired, RetryDecision, RetryState};
pub use worker::{AcquisitionWorker, WorkerSummary};
