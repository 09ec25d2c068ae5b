use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::acquisition::FetchConfig;
use crate::collaborators::{EnrichmentConfig, ToolsConfig};
use crate::credentials::CredentialsConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::sequencer::StageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub stages: StageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Filesystem roots for manifests, credentials and final assets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding `manifest_*.json` files and the tool cache.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory the acquisition worker writes audio files into.
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    /// Cookie jar used by the fetch tool. Defaults to `{data_dir}/cookies.txt`.
    #[serde(default)]
    pub cookies_path: Option<PathBuf>,
}

impl PathsConfig {
    /// Resolved cookie jar location.
    pub fn cookies_path(&self) -> PathBuf {
        self.cookies_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("cookies.txt"))
    }

    /// Cache directory for downloaded helper binaries.
    pub fn bin_dir(&self) -> PathBuf {
        self.data_dir.join("bin")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            music_dir: default_music_dir(),
            cookies_path: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_music_dir() -> PathBuf {
    PathBuf::from("music")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub orchestrator: OrchestratorConfig,
    pub stages: StageConfig,
    pub tools: ToolsConfig,
    pub fetch: FetchConfig,
    pub credentials: CredentialsConfig,
    pub enrichment: SanitizedEnrichmentConfig,
}

/// Enrichment config with the API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEnrichmentConfig {
    pub enabled: bool,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            paths: config.paths.clone(),
            orchestrator: config.orchestrator.clone(),
            stages: config.stages.clone(),
            tools: config.tools.clone(),
            fetch: config.fetch.clone(),
            credentials: config.credentials.clone(),
            enrichment: SanitizedEnrichmentConfig {
                enabled: config.enrichment.enabled,
                api_key_configured: config.enrichment.api_key().is_some(),
            },
        }
    }
}
