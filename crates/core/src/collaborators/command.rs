//! Collaborators backed by external commands.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use super::error::CollaboratorError;
use super::traits::{DiscoveryRequest, Enricher, LinkConverter, TargetDiscovery};
use crate::collaborators::OPENAI_API_KEY_ENV;
use crate::manifest::Query;
use crate::process::{run_with_timeout, CommandSpec};

/// Maps the converter's result list onto a query.
///
/// The converter prints a JSON array of single-key objects such as
/// `[{"Service":"spotify"},{"Artist":"..."}]`; a plain object is also
/// accepted. Null values are ignored.
pub fn parse_converter_output(tool: &str, stdout: &str) -> Result<Option<Query>, CollaboratorError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    // Converters may log before the result; the result is the last line
    // that starts a JSON document.
    let body = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => {
            let start = trimmed
                .lines()
                .rev()
                .find(|l| l.trim_start().starts_with('[') || l.trim_start().starts_with('{'))
                .ok_or_else(|| CollaboratorError::invalid_output(tool, "no JSON result"))?;
            serde_json::from_str(start.trim())
                .map_err(|e| CollaboratorError::invalid_output(tool, e.to_string()))?
        }
    };

    let entries: Vec<(String, Value)> = match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .flatten()
            .collect(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => return Ok(None),
        other => {
            return Err(CollaboratorError::invalid_output(
                tool,
                format!("unexpected result {}", other),
            ))
        }
    };

    let mut query = Query::default();
    let mut any = false;
    for (key, value) in entries {
        let text = match &value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Null => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        };
        let slot = match key.as_str() {
            "Captured_URL" => &mut query.captured_url,
            "Service" => &mut query.service,
            "Media" => &mut query.media,
            "Artist" => &mut query.artist_url,
            "Album" => &mut query.album,
            "Track" => &mut query.track,
            "ChannelUrl" => &mut query.channel_url,
            _ => {
                query.extra.insert(key, value);
                continue;
            }
        };
        if text.is_some() {
            any = true;
        }
        *slot = text;
    }

    Ok(any.then_some(query))
}

/// Link converter run as `<cmd> <url> <manifest_path>`.
#[derive(Debug, Clone)]
pub struct CommandLinkConverter {
    spec: CommandSpec,
}

impl CommandLinkConverter {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl LinkConverter for CommandLinkConverter {
    async fn convert(
        &self,
        url: &str,
        manifest_path: &Path,
    ) -> Result<Option<Query>, CollaboratorError> {
        let label = self.spec.label();
        let cmd = self
            .spec
            .command([url.into(), manifest_path.as_os_str().to_os_string()]);
        let output = run_with_timeout(cmd, &label, None).await?;
        if !output.stderr.trim().is_empty() {
            debug!("{} stderr: {}", label, output.stderr.trim());
        }
        if !output.success() {
            return Err(CollaboratorError::Failed {
                tool: label,
                code: output.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        parse_converter_output(&label, &output.stdout)
    }
}

/// Picks the locator out of discovery output: the last non-empty line,
/// accepted only when it is an `https` URL.
pub fn parse_locator(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .filter(|l| l.starts_with("https"))
        .map(str::to_string)
}

/// Target discovery run as `<cmd> <root> <media> <album> <track>`.
#[derive(Debug, Clone)]
pub struct CommandTargetDiscovery {
    spec: CommandSpec,
}

impl CommandTargetDiscovery {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl TargetDiscovery for CommandTargetDiscovery {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<Option<String>, CollaboratorError> {
        let label = self.spec.label();
        let cmd = self.spec.command([
            request.root.as_str(),
            request.media.as_str(),
            request.album.as_str(),
            request.track.as_str(),
        ]);
        let output = run_with_timeout(cmd, &label, None).await?;
        if !output.success() {
            warn!(
                "{} exited with {:?}: {}",
                label,
                output.code(),
                output.stderr.trim()
            );
            return Ok(None);
        }
        Ok(parse_locator(&output.stdout))
    }
}

/// Enrichment run as `<cmd> <manifest_path>` with the API key in the
/// environment.
#[derive(Debug, Clone)]
pub struct CommandEnricher {
    spec: CommandSpec,
    api_key: String,
}

impl CommandEnricher {
    pub fn new(spec: CommandSpec, api_key: impl Into<String>) -> Self {
        Self {
            spec,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Enricher for CommandEnricher {
    async fn enrich(&self, manifest_path: &Path) -> Result<(), CollaboratorError> {
        let label = self.spec.label();
        let mut cmd = self.spec.command([manifest_path.as_os_str()]);
        cmd.env(OPENAI_API_KEY_ENV, &self.api_key);
        let output = run_with_timeout(cmd, &label, None).await?;
        if output.success() {
            Ok(())
        } else {
            Err(CollaboratorError::Failed {
                tool: label,
                code: output.code(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
