//! Manifest document types.
//!
//! Known fields are typed; every other top-level key (and every unknown key
//! on a track) is kept in `extra` so that read-modify-write never drops data
//! written by external collaborators.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManifestStatus {
    /// Created, nothing resolved yet.
    #[default]
    Queued,
    /// Link conversion has produced a query.
    Resolving,
    /// Finalized and waiting for the acquisition worker.
    Ready,
    /// Handed off to the acquisition worker.
    Acquiring,
    /// Worker finished with every unit attempted.
    Acquired,
    /// Unrecoverable job failure; left on disk for diagnosis.
    Failed,
    /// A status written by something other than this system, kept verbatim.
    Other(String),
}

impl ManifestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Resolving => "resolving",
            Self::Ready => "ready",
            Self::Acquiring => "acquiring",
            Self::Acquired => "acquired",
            Self::Failed => "failed",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for ManifestStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "queued" => Self::Queued,
            "resolving" => Self::Resolving,
            "ready" => Self::Ready,
            "acquiring" => Self::Acquiring,
            "acquired" => Self::Acquired,
            "failed" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl From<ManifestStatus> for String {
    fn from(status: ManifestStatus) -> Self {
        match status {
            ManifestStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acquisition status of a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the acquisition worker should attempt this track.
    pub fn needs_attempt(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetchable unit of work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackEntry {
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: String,
    #[serde(default)]
    pub status: TrackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrackEntry {
    pub fn new(number: u32, title: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            number: Some(number),
            title: title.into(),
            duration: duration.into(),
            ..Default::default()
        }
    }
}

/// Structured identity of the link being acquired.
///
/// Aliases accept the key spellings collaborators write into the manifest
/// side channel (`artist`, `captured_URL`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, alias = "artist", skip_serializing_if = "Option::is_none")]
    pub artist_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,
    #[serde(
        default,
        alias = "captured_URL",
        alias = "captured_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub captured_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn artist(&self) -> Option<&str> {
        Self::present(&self.artist_url)
    }

    pub fn album(&self) -> Option<&str> {
        Self::present(&self.album)
    }

    pub fn track(&self) -> Option<&str> {
        Self::present(&self.track)
    }

    pub fn channel(&self) -> Option<&str> {
        Self::present(&self.channel_url)
    }

    /// A query identifies something when it names an artist or an album.
    pub fn is_identifying(&self) -> bool {
        self.artist().is_some() || self.album().is_some()
    }

    /// Where target discovery should start looking.
    pub fn discovery_root(&self) -> Option<&str> {
        self.channel().or_else(|| self.artist())
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> String {
        let parts: Vec<&str> = [self.artist(), self.album(), self.track()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            "(unnamed)".to_string()
        } else {
            parts.join(" - ")
        }
    }
}

/// The per-job document shared across process boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: String,
    pub source_url: String,
    #[serde(default)]
    pub status: ManifestStatus,
    #[serde(default)]
    pub music_download_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    #[serde(rename = "Query", default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(rename = "Tracks", default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<TrackEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tracks: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// A fresh `queued` manifest.
    pub fn new(
        session_id: impl Into<String>,
        source_url: impl Into<String>,
        music_download_path: impl Into<PathBuf>,
    ) -> Self {
        let mut extra = Map::new();
        extra.insert("metadata".to_string(), Value::Object(Map::new()));
        Self {
            session_id: session_id.into(),
            source_url: source_url.into(),
            status: ManifestStatus::Queued,
            music_download_path: music_download_path.into(),
            download_url: None,
            resolved_url: None,
            query: None,
            tracks: None,
            total_tracks: None,
            extra,
        }
    }

    /// Tracks, or an empty slice when the list is absent.
    pub fn track_list(&self) -> &[TrackEntry] {
        self.tracks.as_deref().unwrap_or(&[])
    }

    /// A non-empty string value from the untyped fields.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Rebuilds a query from fields a collaborator wrote directly into the
    /// manifest (`Primary_Artist`, `Album_Title`, `Track_Title`).
    pub fn side_channel_query(&self) -> Query {
        let artist = ["Primary_Artist", "artist", "Artist"]
            .iter()
            .find_map(|k| self.extra_str(k));
        Query {
            artist_url: artist.map(str::to_string),
            album: self.extra_str("Album_Title").map(str::to_string),
            track: self.extra_str("Track_Title").map(str::to_string),
            ..Default::default()
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_manifest_shape() {
        let manifest = Manifest::new("1-2-abc", "https://example.com/a", "/music");
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["session_id"], "1-2-abc");
        assert_eq!(value["status"], "queued");
        assert_eq!(value["music_download_path"], "/music");
        assert_eq!(value["metadata"], json!({}));
        assert!(value.get("Tracks").is_none());
        assert!(value.get("Query").is_none());
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let raw = json!({
            "session_id": "s",
            "source_url": "u",
            "status": "queued",
            "music_download_path": "/m",
            "Album_Title": "Abbey Road",
            "genre": "rock",
            "Tracks": [{"number": 1, "title": "Come Together", "duration": "4:20",
                        "status": "pending", "isrc": "GBAYE0601690"}]
        });
        let manifest: Manifest = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(manifest.extra_str("Album_Title"), Some("Abbey Road"));
        assert_eq!(manifest.track_list()[0].extra["isrc"], "GBAYE0601690");

        let back = serde_json::to_value(&manifest).unwrap();
        assert_eq!(back["genre"], "rock");
        assert_eq!(back["Tracks"][0]["isrc"], "GBAYE0601690");
    }

    #[test]
    fn test_track_fields_are_lenient() {
        let track: TrackEntry =
            serde_json::from_value(json!({"number": "7", "title": "X", "duration": 215}))
                .unwrap();
        assert_eq!(track.number, Some(7));
        assert_eq!(track.duration, "215");
        assert_eq!(track.status, TrackStatus::Pending);
    }

    #[test]
    fn test_unknown_status_is_kept_verbatim() {
        let manifest: Manifest = serde_json::from_value(json!({
            "session_id": "s", "source_url": "u", "status": "scraping"
        }))
        .unwrap();
        assert_eq!(
            manifest.status,
            ManifestStatus::Other("scraping".to_string())
        );
        assert_eq!(serde_json::to_value(&manifest).unwrap()["status"], "scraping");
    }

    #[test]
    fn test_known_status_spelling() {
        let manifest: Manifest = serde_json::from_value(json!({
            "session_id": "s", "source_url": "u", "status": "acquired"
        }))
        .unwrap();
        assert_eq!(manifest.status, ManifestStatus::Acquired);
        assert_eq!(serde_json::to_value(&manifest).unwrap()["status"], "acquired");
    }

    #[test]
    fn test_query_accepts_side_channel_spellings() {
        let query: Query = serde_json::from_value(json!({
            "service": "spotify",
            "artist": "The Beatles",
            "album": "Abbey Road",
            "captured_URL": "https://open.spotify.com/album/x"
        }))
        .unwrap();
        assert_eq!(query.artist(), Some("The Beatles"));
        assert_eq!(
            query.captured_url.as_deref(),
            Some("https://open.spotify.com/album/x")
        );
        assert!(query.is_identifying());
    }

    #[test]
    fn test_query_identity_ignores_blank_values() {
        let query = Query {
            artist_url: Some("  ".to_string()),
            track: Some("Song".to_string()),
            ..Default::default()
        };
        assert!(!query.is_identifying());
        assert_eq!(query.label(), "Song");
    }

    #[test]
    fn test_discovery_root_prefers_channel() {
        let query = Query {
            artist_url: Some("https://artist".to_string()),
            channel_url: Some("https://channel".to_string()),
            ..Default::default()
        };
        assert_eq!(query.discovery_root(), Some("https://channel"));
    }

    #[test]
    fn test_side_channel_query() {
        let mut manifest = Manifest::new("s", "u", "/m");
        manifest
            .extra
            .insert("Primary_Artist".to_string(), json!("Nina Simone"));
        manifest
            .extra
            .insert("Album_Title".to_string(), json!("Pastel Blues"));
        let query = manifest.side_channel_query();
        assert_eq!(query.artist(), Some("Nina Simone"));
        assert_eq!(query.album(), Some("Pastel Blues"));
        assert!(query.track().is_none());
    }
}
