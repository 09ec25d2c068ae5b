//! Durable read-merge-write access to manifest files.

use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::merge::merge_shallow;
use super::types::Manifest;
use super::ManifestError;

const FILE_PREFIX: &str = "manifest_";
const FILE_SUFFIX: &str = ".json";

/// Generates a fresh session id: `{unix_millis}-{pid}-{uuid_v4}`.
pub fn new_session_id() -> String {
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        std::process::id(),
        uuid::Uuid::new_v4()
    )
}

/// Reads and parses the manifest at `path`.
pub async fn read_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let bytes = read_bytes(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| ManifestError::parse(path, e))
}

/// Reads the manifest at `path` as an untyped JSON object.
pub async fn read_raw(path: &Path) -> Result<Map<String, Value>, ManifestError> {
    let bytes = read_bytes(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| ManifestError::parse(path, e))
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>, ManifestError> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io(e)
        }
    })
}

/// Writes `doc` to `path` atomically (temp file in the same directory, then
/// rename), pretty-printed.
pub async fn write_raw(path: &Path, doc: &Map<String, Value>) -> Result<(), ManifestError> {
    let body = serde_json::to_vec_pretty(doc).map_err(ManifestError::Serialize)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, body).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ManifestError::Io(e));
    }
    Ok(())
}

/// Merges `manifest` onto whatever is currently on disk and writes the result.
///
/// Keys the typed manifest does not know about, including ones written by a
/// collaborator since the last read, are preserved.
pub async fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    let mut doc = match read_raw(path).await {
        Ok(doc) => doc,
        Err(ManifestError::NotFound(_)) => Map::new(),
        Err(e) => return Err(e),
    };
    let patch = match serde_json::to_value(manifest).map_err(ManifestError::Serialize)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merge_shallow(&mut doc, patch);
    write_raw(path, &doc).await
}

/// Read-modify-write of the manifest at `path`.
///
/// The closure sees the freshly read document; its result is merged back
/// onto the file and the updated manifest is returned.
pub async fn update<F>(path: &Path, apply: F) -> Result<Manifest, ManifestError>
where
    F: FnOnce(&mut Manifest),
{
    let mut manifest = read_manifest(path).await?;
    apply(&mut manifest);
    write_manifest(path, &manifest).await?;
    Ok(manifest)
}

/// Merges a raw JSON patch into the manifest at `path`.
pub async fn patch(path: &Path, patch: Map<String, Value>) -> Result<(), ManifestError> {
    let mut doc = read_raw(path).await?;
    merge_shallow(&mut doc, patch);
    write_raw(path, &doc).await
}

/// Deletes the manifest at `path`. A missing file is not an error.
pub async fn delete(path: &Path) -> Result<(), ManifestError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManifestError::Io(e)),
    }
}

/// Manifest files rooted in one data directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest for `session_id`.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, session_id, FILE_SUFFIX))
    }

    /// Creates a new `queued` manifest and returns it with its path.
    pub async fn create(
        &self,
        source_url: &str,
        music_download_path: &Path,
    ) -> Result<(PathBuf, Manifest), ManifestError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let manifest = Manifest::new(new_session_id(), source_url, music_download_path);
        let path = self.path_for(&manifest.session_id);
        let doc = match serde_json::to_value(&manifest).map_err(ManifestError::Serialize)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        write_raw(&path, &doc).await?;
        debug!(path = %path.display(), "Created manifest");
        Ok((path, manifest))
    }

    /// Paths of every manifest file in the directory.
    pub async fn list(&self) -> Result<Vec<PathBuf>, ManifestError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(ManifestError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Deletes every manifest file. Returns how many were removed.
    pub async fn purge(&self) -> Result<usize, ManifestError> {
        let mut removed = 0;
        for path in self.list().await? {
            match delete(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), "Failed to delete manifest: {}", e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestStatus, TrackEntry, TrackStatus};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1], std::process::id().to_string());
        assert!(uuid::Uuid::parse_str(parts[2]).is_ok());
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let (path, created) = store
            .create("https://example.com/x", Path::new("/music"))
            .await
            .unwrap();

        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("manifest_"));
        let read = read_manifest(&path).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read.status, ManifestStatus::Queued);
    }

    #[tokio::test]
    async fn test_update_preserves_foreign_keys() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let (path, _) = store.create("u", Path::new("/m")).await.unwrap();

        // A collaborator writes straight into the file.
        let mut foreign = Map::new();
        foreign.insert("Album_Title".to_string(), json!("Kind of Blue"));
        patch(&path, foreign).await.unwrap();

        update(&path, |m| {
            m.status = ManifestStatus::Ready;
            m.tracks = Some(vec![TrackEntry::new(1, "So What", "9:22")]);
        })
        .await
        .unwrap();

        let raw = read_raw(&path).await.unwrap();
        assert_eq!(raw["Album_Title"], "Kind of Blue");
        assert_eq!(raw["status"], "ready");
        assert_eq!(raw["Tracks"][0]["status"], TrackStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_manifest(&dir.path().join("manifest_nope.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_garbage_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest_bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = read_manifest(&path).await.unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let (path, _) = store.create("u", Path::new("/m")).await.unwrap();
        delete(&path).await.unwrap();
        delete(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_purge_only_touches_manifests() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        store.create("a", Path::new("/m")).await.unwrap();
        store.create("b", Path::new("/m")).await.unwrap();
        tokio::fs::write(dir.path().join("cookies.txt"), b"# jar")
            .await
            .unwrap();

        assert_eq!(store.purge().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
        assert!(dir.path().join("cookies.txt").exists());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let store = ManifestStore::new("/nonexistent/ripline/data");
        assert!(store.list().await.unwrap().is_empty());
    }
}
