//! Durable playlist summaries and snapshot drift detection.
//!
//! A summary is a projection of a playlist and its track list taken during
//! a sync run. All summaries of a run are written together to
//! [`SUMMARIES_FILE`](crate::cache::SUMMARIES_FILE), replacing the previous
//! file. The previous file is also what drift detection compares against:
//! when a playlist's snapshot token has changed since it was last
//! summarized, its cached track list is dropped before it is read again.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{CatalogCache, read_json_file, write_atomic};
use crate::catalog::Catalog;
use crate::error::{Result, SummaryError};
use crate::model::{Image, PlaylistId, PlaylistTrack};
use crate::playlist::{Playlist, PlaylistSet};

/// Format of a playlist entry's `added_at` field.
pub const ADDED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// User reference inside a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistUser {
    /// User ID.
    pub id: String,
}

/// Summary of one playlist at the time it was last synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    /// Playlist ID.
    pub id: PlaylistId,
    /// Display name.
    pub name: String,
    /// User whose listing the playlist came from.
    pub user: PlaylistUser,
    /// Owner of the playlist.
    pub owner: PlaylistUser,
    /// Cover images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Free-text description; the catalog listing does not carry one.
    #[serde(default)]
    pub description: String,
    /// Number of entries in the track list.
    pub number_of_tracks: u32,
    /// Latest `added_at` of any entry, or the Unix epoch for an empty list.
    pub last_modified: DateTime<Utc>,
    /// Whether the user follows a playlist owned by someone else.
    pub subscribed: bool,
    /// Snapshot token at summarization time.
    #[serde(rename = "snapshot")]
    pub snapshot_id: String,
}

/// Every summary written by one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummaries {
    /// Summaries in playlist listing order.
    pub playlists: Vec<PlaylistSummary>,
}

impl PlaylistSummaries {
    /// Summary for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &PlaylistId) -> Option<&PlaylistSummary> {
        self.playlists.iter().find(|s| &s.id == id)
    }

    /// Load a summaries file. `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        Ok(read_json_file(path)?)
    }

    /// Replace the summaries file with this batch.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        write_atomic(path, content.as_bytes())?;
        Ok(())
    }
}

/// Parse an `added_at` value.
pub fn parse_added_at(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, ADDED_AT_FORMAT).map(|naive| naive.and_utc())
}

/// Summarize a playlist and its track list.
pub fn summarize(
    playlist: &Playlist,
    tracks: &[PlaylistTrack],
) -> std::result::Result<PlaylistSummary, SummaryError> {
    let mut last_modified = DateTime::<Utc>::UNIX_EPOCH;

    for entry in tracks {
        let added_at =
            parse_added_at(&entry.added_at).map_err(|e| SummaryError::InvalidTimestamp {
                playlist: playlist.id.to_string(),
                value: entry.added_at.clone(),
                reason: e.to_string(),
            })?;

        if added_at > last_modified {
            last_modified = added_at;
        }
    }

    Ok(PlaylistSummary {
        id: playlist.id.clone(),
        name: playlist.name.clone(),
        user: PlaylistUser {
            id: playlist.user.clone(),
        },
        owner: PlaylistUser {
            id: playlist.owner.clone(),
        },
        images: playlist.images.clone(),
        description: String::new(),
        number_of_tracks: u32::try_from(tracks.len()).unwrap_or(u32::MAX),
        last_modified,
        subscribed: playlist.is_subscribed(),
        snapshot_id: playlist.snapshot_id.clone(),
    })
}

/// Whether a playlist changed since `previous` was taken.
#[must_use]
pub fn has_drifted(previous: &PlaylistSummary, current: &Playlist) -> bool {
    previous.id == current.id && previous.snapshot_id != current.snapshot_id
}

/// What a summarization pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// The summaries that were written.
    pub summaries: PlaylistSummaries,
    /// Playlists whose cached track list was dropped because of drift.
    pub invalidated: Vec<PlaylistId>,
}

/// Summarize every playlist, invalidating drifted track lists first, and
/// replace the summaries file.
pub fn summarize_all<C: Catalog + ?Sized>(
    cache: &mut CatalogCache<'_, C>,
    playlists: &PlaylistSet,
) -> Result<SummaryOutcome> {
    let path = cache.entities().summaries_path();
    let previous = PlaylistSummaries::load(&path)?.unwrap_or_default();
    let previous: HashMap<&PlaylistId, &PlaylistSummary> =
        previous.playlists.iter().map(|s| (&s.id, s)).collect();

    let mut outcome = SummaryOutcome::default();

    for playlist in playlists {
        if let Some(prior) = previous.get(&playlist.id)
            && has_drifted(prior, playlist)
        {
            warn!(
                "Playlist {} changed ({} != {}), invalidating",
                playlist.id, prior.snapshot_id, playlist.snapshot_id
            );
            cache.invalidate_playlist(&playlist.id)?;
            outcome.invalidated.push(playlist.id.clone());
        }

        let tracks = cache.playlist_tracks(&playlist.id)?;
        let summary = summarize(playlist, &tracks)?;

        info!(
            "Playlist {} {} ({} tracks) {}",
            playlist.id,
            playlist.name,
            tracks.len(),
            summary.last_modified
        );

        outcome.summaries.playlists.push(summary);
    }

    outcome.summaries.save(&path)?;
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::EntityCache;
    use crate::catalog::MockCatalog;
    use crate::error::{CacheError, Error};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn playlist(id: &str, snapshot: &str) -> Playlist {
        Playlist {
            id: PlaylistId::new(id),
            user: "bob".to_string(),
            owner: "bob".to_string(),
            name: "2023 march".to_string(),
            images: Vec::new(),
            snapshot_id: snapshot.to_string(),
        }
    }

    fn added(at: &str) -> PlaylistTrack {
        PlaylistTrack {
            added_at: at.to_string(),
            track: None,
        }
    }

    #[test]
    fn test_last_modified_is_latest_added_at() {
        let tracks = vec![
            added("2023-03-02T10:00:00Z"),
            added("2023-03-09T08:30:00Z"),
            added("2023-03-05T23:59:59Z"),
        ];
        let summary = summarize(&playlist("p1", "s1"), &tracks).expect("summarize");

        assert_eq!(summary.number_of_tracks, 3);
        assert_eq!(
            summary.last_modified,
            Utc.with_ymd_and_hms(2023, 3, 9, 8, 30, 0).unwrap()
        );
        assert_eq!(summary.snapshot_id, "s1");
        assert!(!summary.subscribed);
    }

    #[test]
    fn test_empty_playlist_summary() {
        let summary = summarize(&playlist("p1", "s1"), &[]).expect("summarize");
        assert_eq!(summary.number_of_tracks, 0);
        assert_eq!(summary.last_modified, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let err = summarize(&playlist("p1", "s1"), &[added("2023-03-02 10:00")]).unwrap_err();
        assert!(matches!(
            err,
            SummaryError::InvalidTimestamp { ref value, .. } if value == "2023-03-02 10:00"
        ));
    }

    #[test]
    fn test_summary_json_field_names() {
        let summary = summarize(&playlist("p1", "s1"), &[]).expect("summarize");
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["numberOfTracks"], 0);
        assert_eq!(json["snapshot"], "s1");
        assert_eq!(json["user"]["id"], "bob");
        assert!(json.get("lastModified").is_some());
    }

    #[test]
    fn test_has_drifted() {
        let prior = summarize(&playlist("p1", "s1"), &[]).expect("summarize");
        assert!(!has_drifted(&prior, &playlist("p1", "s1")));
        assert!(has_drifted(&prior, &playlist("p1", "s2")));
        assert!(!has_drifted(&prior, &playlist("p2", "s2")));
    }

    fn seeded_cache(temp_dir: &TempDir, prior_snapshot: &str) {
        let mut entities = EntityCache::new(temp_dir.path()).expect("cache");
        entities
            .put("p1", &vec![added("2023-03-01T10:00:00Z")])
            .expect("put");
        PlaylistSummaries {
            playlists: vec![summarize(&playlist("p1", prior_snapshot), &[]).unwrap()],
        }
        .save(&entities.summaries_path())
        .expect("save");
    }

    #[test]
    fn test_snapshot_change_invalidates_track_list() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        seeded_cache(&temp_dir, "s1");

        let mut catalog = MockCatalog::new();
        catalog
            .expect_playlist_tracks_page()
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    added("2023-03-01T10:00:00Z"),
                    added("2023-03-04T10:00:00Z"),
                ])
            });

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities);
        let playlists = PlaylistSet::new(vec![playlist("p1", "s2")]);

        let outcome = summarize_all(&mut cache, &playlists).expect("summarize");
        assert_eq!(outcome.invalidated, vec![PlaylistId::new("p1")]);
        assert_eq!(outcome.summaries.playlists[0].number_of_tracks, 2);

        let written = PlaylistSummaries::load(&temp_dir.path().join("playlists.json"))
            .expect("load")
            .expect("present");
        assert_eq!(written.playlists[0].snapshot_id, "s2");
    }

    #[test]
    fn test_same_snapshot_keeps_cached_track_list() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        seeded_cache(&temp_dir, "s1");

        let mut catalog = MockCatalog::new();
        catalog.expect_playlist_tracks_page().times(0);

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities);
        let playlists = PlaylistSet::new(vec![playlist("p1", "s1")]);

        let outcome = summarize_all(&mut cache, &playlists).expect("summarize");
        assert!(outcome.invalidated.is_empty());
        assert_eq!(outcome.summaries.playlists[0].number_of_tracks, 1);
    }

    #[test]
    fn test_missing_prior_summaries_is_not_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut catalog = MockCatalog::new();
        catalog
            .expect_playlist_tracks_page()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities);
        let playlists = PlaylistSet::new(vec![playlist("p1", "s1")]);

        let outcome = summarize_all(&mut cache, &playlists).expect("summarize");
        assert!(outcome.invalidated.is_empty());
        assert_eq!(outcome.summaries.playlists.len(), 1);
    }

    #[test]
    fn test_corrupt_summaries_file_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("playlists.json"), "[").unwrap();

        let err = PlaylistSummaries::load(&temp_dir.path().join("playlists.json")).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::Corrupt { .. })));
    }
}
