//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of every collaborator seam,
//! allowing full pipeline runs without external tools or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripline_core::testing::{MockLinkConverter, MockTargetDiscovery, MockLauncher};
//!
//! let converter = MockLinkConverter::new();
//! converter.set_query(Some(fixtures::album_query("Air", "Moon Safari"))).await;
//!
//! let discovery = MockTargetDiscovery::new();
//! discovery.set_result(Some("https://www.youtube.com/playlist?list=X".into())).await;
//! ```

mod mock_collaborators;
mod mock_fetch_tool;
mod mock_launcher;
mod mock_processor;
mod mock_refresher;

pub use mock_collaborators::{MockEnricher, MockLinkConverter, MockTargetDiscovery};
pub use mock_fetch_tool::{FetchOutcome, MockFetchTool};
pub use mock_launcher::MockLauncher;
pub use mock_processor::{MockJobProcessor, ProcessorBehavior};
pub use mock_refresher::MockRefresher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::manifest::{self, ManifestStatus, ManifestStore, Query, TrackEntry};
    use crate::orchestrator::Job;

    /// A job at queue position 0.
    pub fn job(url: &str) -> Job {
        Job::new(url, 0)
    }

    /// A query naming an artist and an album.
    pub fn album_query(artist: &str, album: &str) -> Query {
        Query {
            service: Some("spotify".to_string()),
            media: Some("album".to_string()),
            artist_url: Some(artist.to_string()),
            album: Some(album.to_string()),
            track: Some("Full Album".to_string()),
            ..Default::default()
        }
    }

    /// Numbered pending tracks with the given titles.
    pub fn tracks(titles: &[&str]) -> Vec<TrackEntry> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| TrackEntry::new(i as u32 + 1, *title, "3:30"))
            .collect()
    }

    /// Writes a `ready` manifest into `dir` with the given tracks, as the
    /// sequencer leaves it before handoff.
    pub async fn ready_manifest(dir: &Path, download_url: &str, titles: &[&str]) -> PathBuf {
        let store = ManifestStore::new(dir);
        let (path, _) = store
            .create("https://open.spotify.com/album/fixture", &dir.join("music"))
            .await
            .expect("create fixture manifest");
        let download_url = download_url.to_string();
        let tracks = tracks(titles);
        manifest::update(&path, move |m| {
            m.download_url = Some(download_url);
            m.tracks = Some(tracks);
            m.status = ManifestStatus::Ready;
        })
        .await
        .expect("finalize fixture manifest");
        path
    }
}
