use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Stage and refresh timeouts are non-zero
/// - Every external command names a program
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let stages = &config.stages;
    for (name, secs) in [
        (
            "stages.link_conversion_timeout_secs",
            stages.link_conversion_timeout_secs,
        ),
        (
            "stages.target_discovery_timeout_secs",
            stages.target_discovery_timeout_secs,
        ),
        ("stages.enrichment_timeout_secs", stages.enrichment_timeout_secs),
        ("credentials.timeout_secs", config.credentials.timeout_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", name)));
        }
    }

    for (name, command) in [
        ("tools.link_converter", &config.tools.link_converter),
        ("tools.target_discovery", &config.tools.target_discovery),
        ("tools.enrichment", &config.tools.enrichment),
        ("credentials.exporter", &config.credentials.exporter),
    ] {
        if command.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{}.program cannot be empty",
                name
            )));
        }
    }

    Ok(())
}
