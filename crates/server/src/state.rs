use std::sync::Arc;
use ripline_core::{
    Config, CredentialRefresher, EventSink, LinkQueue, ManifestStore, Orchestrator,
    SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    store: ManifestStore,
    refresher: Arc<dyn CredentialRefresher>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<Orchestrator>,
        store: ManifestStore,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            store,
            refresher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn queue(&self) -> &Arc<LinkQueue> {
        self.orchestrator.queue()
    }

    pub fn events(&self) -> &EventSink {
        self.orchestrator.events()
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn refresher(&self) -> &dyn CredentialRefresher {
        self.refresher.as_ref()
    }
}
