//! External tool commands.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::process::CommandSpec;

/// Environment variable consulted when no enrichment key is configured.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Commands for the external collaborators and the worker binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// `<cmd> <url> <manifest_path>`, prints the resolved query.
    #[serde(default = "default_link_converter")]
    pub link_converter: CommandSpec,

    /// `<cmd> <artist_url> <media> <album> <track>`, prints a locator.
    #[serde(default = "default_target_discovery")]
    pub target_discovery: CommandSpec,

    /// `<cmd> <manifest_path>`, enriches the manifest in place.
    #[serde(default = "default_enrichment")]
    pub enrichment: CommandSpec,

    /// Acquisition worker binary. A bare name is looked up next to the
    /// server executable first.
    #[serde(default = "default_worker_path")]
    pub worker_path: PathBuf,
}

fn default_link_converter() -> CommandSpec {
    CommandSpec::new("node", &["scripts/link-convert.js"])
}

fn default_target_discovery() -> CommandSpec {
    CommandSpec::new("node", &["scripts/get_yt_dlp_link.js"])
}

fn default_enrichment() -> CommandSpec {
    CommandSpec::new("node", &["scripts/fetch_gpt_meta.js"])
}

fn default_worker_path() -> PathBuf {
    PathBuf::from("ripline-acquire")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            link_converter: default_link_converter(),
            target_discovery: default_target_discovery(),
            enrichment: default_enrichment(),
            worker_path: default_worker_path(),
        }
    }
}

/// Optional metadata enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Used when `OPENAI_API_KEY` is unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: None,
        }
    }
}

impl EnrichmentConfig {
    /// The environment's key, else the configured one.
    pub fn api_key(&self) -> Option<String> {
        pick_api_key(std::env::var(OPENAI_API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    /// Enrichment runs only when enabled and a key is available.
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key().is_some()
    }
}

fn pick_api_key(from_env: Option<String>, configured: Option<&str>) -> Option<String> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or_else(|| configured.filter(|k| !k.trim().is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.link_converter.program, "node");
        assert_eq!(tools.link_converter.args, vec!["scripts/link-convert.js"]);
        assert_eq!(tools.worker_path, PathBuf::from("ripline-acquire"));
    }

    #[test]
    fn test_configured_key_is_used() {
        let config = EnrichmentConfig {
            enabled: true,
            api_key: Some("sk-test".to_string()),
        };
        assert!(config.api_key().is_some());
        assert!(config.is_active());
    }

    #[test]
    fn test_environment_key_wins() {
        assert_eq!(
            pick_api_key(Some("sk-env".to_string()), Some("sk-file")).as_deref(),
            Some("sk-env")
        );
        assert_eq!(
            pick_api_key(Some("  ".to_string()), Some("sk-file")).as_deref(),
            Some("sk-file")
        );
        assert_eq!(pick_api_key(None, Some("")), None);
    }

    #[test]
    fn test_disabled_enrichment_is_inactive() {
        let config = EnrichmentConfig {
            enabled: false,
            api_key: Some("sk-test".to_string()),
        };
        assert!(!config.is_active());
    }
}
