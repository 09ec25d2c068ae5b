use serde::{Deserialize, Serialize};

use crate::process::CommandSpec;

/// Credential exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Browser automation that writes a fresh cookie jar.
    /// Invoked as `<exporter> <service> <cookies_path>`.
    #[serde(default = "default_exporter")]
    pub exporter: CommandSpec,

    #[serde(default = "default_service")]
    pub service: String,

    /// Ceiling for one exporter run.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Refresh once at server startup when no cookie jar exists.
    #[serde(default = "default_refresh_on_startup")]
    pub refresh_on_startup: bool,
}

fn default_exporter() -> CommandSpec {
    CommandSpec::new("node", &["scripts/cookie_exporter.cjs"])
}

fn default_service() -> String {
    "youtube".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_on_startup() -> bool {
    true
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            exporter: default_exporter(),
            service: default_service(),
            timeout_secs: default_timeout(),
            refresh_on_startup: default_refresh_on_startup(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_exporter() {
        let toml = r#"
            service = "ytmusic"
            timeout_secs = 45

            [exporter]
            program = "/usr/local/bin/export-cookies"
        "#;
        let config: CredentialsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.exporter.program, "/usr/local/bin/export-cookies");
        assert!(config.exporter.args.is_empty());
        assert_eq!(config.service, "ytmusic");
        assert_eq!(config.timeout_secs, 45);
        assert!(config.refresh_on_startup);
    }
}
