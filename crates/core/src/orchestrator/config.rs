//! Orchestrator configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// Configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of parallel pipelines. Unset (or 0) derives it from the
    /// machine's CPU count and memory.
    #[serde(default, deserialize_with = "zero_as_none")]
    pub concurrency: Option<usize>,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_event_buffer() -> usize {
    256
}

fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<usize>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v > 0))
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            event_buffer: default_event_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.concurrency, None);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_deserialize_concurrency() {
        let config: OrchestratorConfig = toml::from_str("concurrency = 6").unwrap();
        assert_eq!(config.concurrency, Some(6));
    }

    #[test]
    fn test_zero_concurrency_means_auto() {
        let config: OrchestratorConfig = toml::from_str("concurrency = 0").unwrap();
        assert_eq!(config.concurrency, None);
    }
}
