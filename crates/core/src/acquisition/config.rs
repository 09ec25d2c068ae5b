//! Fetch tool configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the acquisition worker and its fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Explicit fetch tool binary. When unset the tool is looked up in the
    /// cache directory, then on `PATH`, then downloaded.
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Run the tool's self-update after every credential refresh.
    #[serde(default = "default_true")]
    pub update_on_refresh: bool,

    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// `0` is best.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Extractor strategy added to the retry after a credential refresh.
    #[serde(default = "default_fallback_client")]
    pub fallback_client: String,

    /// Seconds between requests.
    #[serde(default = "default_sleep_requests")]
    pub sleep_requests: u32,

    /// Seconds between downloads.
    #[serde(default = "default_sleep_interval")]
    pub sleep_interval: u32,

    /// Download the tool when it cannot be found locally.
    #[serde(default = "default_true")]
    pub download_if_missing: bool,

    /// Base URL of the tool's release assets.
    #[serde(default = "default_release_base_url")]
    pub release_base_url: String,

    /// Raw arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "0".to_string()
}

fn default_fallback_client() -> String {
    "youtube:player_client=android,web".to_string()
}

fn default_sleep_requests() -> u32 {
    1
}

fn default_sleep_interval() -> u32 {
    2
}

fn default_release_base_url() -> String {
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            update_on_refresh: true,
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            fallback_client: default_fallback_client(),
            sleep_requests: default_sleep_requests(),
            sleep_interval: default_sleep_interval(),
            download_if_missing: true,
            release_base_url: default_release_base_url(),
            extra_args: Vec::new(),
        }
    }
}
