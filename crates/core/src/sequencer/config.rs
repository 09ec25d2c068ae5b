//! Stage timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-stage delays and ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Pause after the manifest is first written.
    #[serde(default = "default_settle_ms")]
    pub manifest_settle_ms: u64,

    #[serde(default = "default_link_timeout")]
    pub link_conversion_timeout_secs: u64,

    #[serde(default = "default_discovery_timeout")]
    pub target_discovery_timeout_secs: u64,

    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_secs: u64,

    /// Ceiling for the whole acquisition handoff. Unset means no ceiling.
    #[serde(default)]
    pub acquisition_timeout_secs: Option<u64>,
}

fn default_settle_ms() -> u64 {
    50
}

fn default_link_timeout() -> u64 {
    60
}

fn default_discovery_timeout() -> u64 {
    120
}

fn default_enrichment_timeout() -> u64 {
    300
}

impl StageConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.manifest_settle_ms)
    }

    pub fn link_conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.link_conversion_timeout_secs)
    }

    pub fn target_discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.target_discovery_timeout_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    pub fn acquisition_timeout(&self) -> Option<Duration> {
        self.acquisition_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            manifest_settle_ms: default_settle_ms(),
            link_conversion_timeout_secs: default_link_timeout(),
            target_discovery_timeout_secs: default_discovery_timeout(),
            enrichment_timeout_secs: default_enrichment_timeout(),
            acquisition_timeout_secs: None,
        }
    }
}
