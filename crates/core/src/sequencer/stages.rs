//! Pure stage helpers.

use serde_json::Value;

use crate::manifest::{Manifest, ManifestStatus, Query, TrackEntry, TrackStatus};

/// A URL the fetch tool can consume without discovery.
pub fn is_direct_locator(url: &str) -> bool {
    url.contains("youtube.com") && (url.contains("/watch?v=") || url.contains("/playlist?list="))
}

/// Query to use when the converter returned none: the manifest's own
/// `Query`, else one rebuilt from the side-channel fields.
pub fn fallback_query(manifest: &Manifest) -> Query {
    match &manifest.query {
        Some(query) if query.is_identifying() => query.clone(),
        _ => manifest.side_channel_query(),
    }
}

fn entry_str(entry: &serde_json::Map<String, Value>, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn entry_number(entry: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    let number = match entry.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| *n > 0)
}

/// Converts a collaborator `tracklist` into `Tracks` when `Tracks` is absent.
/// Returns `None` when nothing needs to change.
pub fn normalize(manifest: &Manifest) -> Option<Vec<TrackEntry>> {
    if manifest.tracks.is_some() {
        return None;
    }
    let list = manifest.extra.get("tracklist")?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_object)
            .map(|entry| {
                let mut track = TrackEntry {
                    number: entry_number(entry, "number")
                        .or_else(|| entry_number(entry, "track_number")),
                    title: entry_str(entry, "title"),
                    duration: entry_str(entry, "duration"),
                    ..Default::default()
                };
                if let Some(url) = entry.get("url").filter(|u| !u.is_null()) {
                    track.extra.insert("url".to_string(), url.clone());
                }
                track
            })
            .collect(),
    )
}

/// Final manifest shape handed to the worker.
pub fn finalize(manifest: &mut Manifest, download_url: &str, music_dir: &std::path::Path) {
    manifest.download_url = Some(download_url.to_string());
    manifest.music_download_path = music_dir.to_path_buf();
    if let Some(tracks) = manifest.tracks.as_mut() {
        for track in tracks.iter_mut() {
            track.status = TrackStatus::Pending;
        }
    }
    manifest.status = ManifestStatus::Ready;
}
