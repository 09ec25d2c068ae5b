//! Finding, or fetching, the fetch tool binary.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::config::FetchConfig;
use super::error::AcquisitionError;

/// Release asset name for the current platform.
pub fn release_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp"
    }
}

/// Resolves the fetch tool: configured path, then the cache directory, then
/// `PATH`, then a fresh download into the cache directory.
pub async fn locate_fetch_tool(
    config: &FetchConfig,
    cache_dir: &Path,
) -> Result<PathBuf, AcquisitionError> {
    if let Some(path) = &config.tool_path {
        if path.exists() {
            debug!(path = %path.display(), "Using configured fetch tool");
            return Ok(path.clone());
        }
        debug!(path = %path.display(), "Configured fetch tool does not exist");
    }

    let cached = cache_dir.join(release_asset_name());
    if cached.exists() {
        debug!(path = %cached.display(), "Using cached fetch tool");
        return Ok(cached);
    }

    if let Ok(path) = which::which("yt-dlp") {
        debug!(path = %path.display(), "Using fetch tool from PATH");
        return Ok(path);
    }

    if !config.download_if_missing {
        return Err(AcquisitionError::ToolNotFound(
            "yt-dlp is not installed and downloads are disabled".to_string(),
        ));
    }

    download_fetch_tool(&config.release_base_url, cache_dir).await
}

/// Downloads the platform release asset into `cache_dir`.
pub async fn download_fetch_tool(
    base_url: &str,
    cache_dir: &Path,
) -> Result<PathBuf, AcquisitionError> {
    let asset = release_asset_name();
    let url = format!("{}/{}", base_url.trim_end_matches('/'), asset);
    info!("Downloading fetch tool from {}", url);

    let bytes = reqwest::get(&url)
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    tokio::fs::create_dir_all(cache_dir).await?;
    let target = cache_dir.join(asset);
    let tmp = cache_dir.join(format!(".{}.download", asset));
    tokio::fs::write(&tmp, &bytes).await?;
    set_executable(&tmp).await?;
    tokio::fs::rename(&tmp, &target).await?;

    info!(path = %target.display(), "Fetch tool installed ({} bytes)", bytes.len());
    Ok(target)
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
