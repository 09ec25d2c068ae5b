pub mod acquisition;
pub mod collaborators;
pub mod config;
pub mod credentials;
pub mod events;
pub mod manifest;
pub mod metrics;
pub mod orchestrator;
pub mod process;
pub mod protocol;
pub mod sequencer;
pub mod testing;

pub use acquisition::{
    AcquisitionContext, AcquisitionError, AcquisitionLauncher, AcquisitionReport,
    AcquisitionWorker, FetchConfig, FetchTool, InProcessLauncher, ProcessLauncher, YtDlpFetcher,
};
pub use collaborators::{
    CollaboratorError, CommandEnricher, CommandLinkConverter, CommandTargetDiscovery,
    DiscoveryRequest, Enricher, EnrichmentConfig, LinkConverter, TargetDiscovery, ToolsConfig,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, PathsConfig, SanitizedConfig, ServerConfig,
};
pub use credentials::{
    CookieExporter, CredentialRefresher, CredentialsConfig, RefreshError, RefreshOutcome,
};
pub use events::{EventSink, JobStatus, PipelineEvent};
pub use manifest::{Manifest, ManifestError, ManifestStatus, ManifestStore, Query, TrackEntry};
pub use orchestrator::{
    BatchSummary, Job, LinkQueue, Orchestrator, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus,
};
pub use protocol::WorkerMessage;
pub use sequencer::{JobOutcome, JobProcessor, SequencerError, StageConfig, StageSequencer};
