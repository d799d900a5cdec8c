//! Read-only view of a cache directory for the query server.
//!
//! A library is loaded from the summaries file and the cached track list of
//! each summarized playlist. It is reused for [`DEFAULT_MAX_AGE`] before
//! being reloaded from disk. Missing files mean "nothing cached yet" and
//! never fail a load; a file that exists but does not decode does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{CacheKind, SUMMARIES_FILE, read_json_file};
use crate::error::{Error, Result};
use crate::model::{AlbumId, ArtistId, FullTrack, PlaylistId, PlaylistTrack, TrackId};
use crate::summary::{PlaylistSummaries, PlaylistSummary};

/// How long a load is reused.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// A summarized playlist together with its cached tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlaylist {
    /// Summary as written by the last sync.
    pub summary: PlaylistSummary,
    /// Cached track listing.
    pub tracks: Vec<PlaylistTrack>,
}

/// Playlist reference in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    /// Playlist ID.
    pub id: PlaylistId,
    /// Playlist name.
    pub name: String,
}

/// Album reference in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    /// Album ID, absent for local files.
    pub id: Option<AlbumId>,
    /// Album name.
    pub name: String,
}

/// Artist reference in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    /// Artist ID, absent for local files.
    pub id: Option<ArtistId>,
    /// Artist name.
    pub name: String,
}

/// A matching track and every playlist it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTrack {
    /// Track ID.
    pub id: TrackId,
    /// Track name.
    pub name: String,
    /// Album.
    pub album: AlbumRef,
    /// Credited artists.
    pub artists: Vec<ArtistRef>,
    /// Playlists containing the track, in load order.
    pub playlists: Vec<PlaylistRef>,
}

/// Search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matching tracks, in first-seen order.
    pub tracks: Vec<SearchTrack>,
}

/// Cached playlists loaded from a cache directory.
#[derive(Debug)]
pub struct PlaylistLibrary {
    cache_dir: PathBuf,
    max_age: Duration,
    summaries: PlaylistSummaries,
    playlists: Vec<LoadedPlaylist>,
    loaded_at: Option<Instant>,
}

impl PlaylistLibrary {
    /// Create an empty library over `cache_dir`. Nothing is read yet.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_age: DEFAULT_MAX_AGE,
            summaries: PlaylistSummaries::default(),
            playlists: Vec::new(),
            loaded_at: None,
        }
    }

    /// Create a library and load it.
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut library = Self::new(cache_dir);
        library.load()?;
        Ok(library)
    }

    /// Set how long a load is reused.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Cache directory this library reads.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Reload everything from disk.
    pub fn load(&mut self) -> Result<()> {
        let summaries =
            PlaylistSummaries::load(&self.cache_dir.join(SUMMARIES_FILE))?.unwrap_or_default();

        let mut playlists = Vec::with_capacity(summaries.playlists.len());
        for summary in &summaries.playlists {
            let path = self.track_file(&summary.id);
            match read_json_file::<Vec<PlaylistTrack>>(&path)? {
                Some(tracks) => {
                    debug!("Loaded {} ({} tracks)", path.display(), tracks.len());
                    playlists.push(LoadedPlaylist {
                        summary: summary.clone(),
                        tracks,
                    });
                }
                None => debug!("Skipping {}, no cached tracks", summary.id),
            }
        }

        info!(
            "Loaded {} of {} summarized playlists",
            playlists.len(),
            summaries.playlists.len()
        );

        self.summaries = summaries;
        self.playlists = playlists;
        self.loaded_at = Some(Instant::now());
        Ok(())
    }

    /// Reload unless the last load is younger than the maximum age.
    ///
    /// Returns whether a reload happened.
    pub fn load_if_necessary(&mut self) -> Result<bool> {
        if self
            .loaded_at
            .is_some_and(|loaded_at| loaded_at.elapsed() < self.max_age)
        {
            debug!("Using loaded playlists");
            return Ok(false);
        }

        self.load()?;
        Ok(true)
    }

    /// Summaries from the last load.
    #[must_use]
    pub const fn summaries(&self) -> &PlaylistSummaries {
        &self.summaries
    }

    /// Playlists from the last load that had cached tracks.
    #[must_use]
    pub fn playlists(&self) -> &[LoadedPlaylist] {
        &self.playlists
    }

    /// Cached tracks of any playlist, loaded or not. `None` when not cached.
    pub fn playlist_tracks(&self, id: &PlaylistId) -> Result<Option<Vec<PlaylistTrack>>> {
        if let Some(loaded) = self.playlists.iter().find(|p| &p.summary.id == id) {
            return Ok(Some(loaded.tracks.clone()));
        }

        Ok(read_json_file(&self.track_file(id))?)
    }

    /// Find tracks whose name, album or any artist contains `query`, ignoring case.
    pub fn search(&mut self, query: &str) -> Result<SearchResults> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }

        self.load_if_necessary()?;

        let started = Instant::now();
        let mut results = SearchResults::default();
        let mut positions: HashMap<TrackId, usize> = HashMap::new();

        for playlist in &self.playlists {
            let reference = PlaylistRef {
                id: playlist.summary.id.clone(),
                name: playlist.summary.name.clone(),
            };

            for track in playlist.tracks.iter().filter_map(|t| t.track.as_ref()) {
                let Some(id) = track.id.as_ref() else {
                    continue;
                };
                if !is_match(track, &needle) {
                    continue;
                }

                if let Some(&position) = positions.get(id) {
                    let existing = &mut results.tracks[position];
                    if !existing.playlists.contains(&reference) {
                        existing.playlists.push(reference.clone());
                    }
                } else {
                    positions.insert(id.clone(), results.tracks.len());
                    results
                        .tracks
                        .push(to_search_track(id, track, reference.clone()));
                }
            }
        }

        info!(
            "Search {:?}: {} tracks in {:?}",
            needle,
            results.tracks.len(),
            started.elapsed()
        );
        Ok(results)
    }

    fn track_file(&self, id: &PlaylistId) -> PathBuf {
        self.cache_dir
            .join(CacheKind::PlaylistTracks.file_name(id.as_str()))
    }
}

fn is_match(track: &FullTrack, needle: &str) -> bool {
    track.name.to_lowercase().contains(needle)
        || track.album.name.to_lowercase().contains(needle)
        || track
            .artists
            .iter()
            .any(|a| a.name.to_lowercase().contains(needle))
}

fn to_search_track(id: &TrackId, track: &FullTrack, playlist: PlaylistRef) -> SearchTrack {
    SearchTrack {
        id: id.clone(),
        name: track.name.clone(),
        album: AlbumRef {
            id: track.album.id.clone(),
            name: track.album.name.clone(),
        },
        artists: track
            .artists
            .iter()
            .map(|a| ArtistRef {
                id: a.id.clone(),
                name: a.name.clone(),
            })
            .collect(),
        playlists: vec![playlist],
    }
}
