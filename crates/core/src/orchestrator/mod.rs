//! Pipeline orchestrator.
//!
//! Owns the link queue and runs a bounded pool of stage sequencers over it.

mod concurrency;
mod config;
mod queue;
mod runner;
mod types;

pub use concurrency::{
    compute_concurrency, max_concurrency, recommended_concurrency, ConcurrencyInfo,
    SystemResources, DEFAULT_CONCURRENCY,
};
pub use config::OrchestratorConfig;
pub use queue::{Job, LinkQueue};
pub use runner::Orchestrator;
pub use types::{BatchSummary, OrchestratorError, OrchestratorStatus};
