//! On-disk entity cache for catalog data.
//!
//! Every fetched entity is stored as one JSON document under the cache
//! directory, named from its kind and ID (`playlist-<id>.json`,
//! `playlists-<user>.json`, `track-<id>.json`, ...). The cache itself has no
//! notion of age: a file that exists is served, a file that is missing is
//! fetched and written. Callers decide when to force a refetch or
//! invalidate.
//!
//! Cached values form a closed set, see [`CachedValue`]. Typed access goes
//! through the [`CacheEntity`] trait so each Rust type maps to exactly one
//! [`CacheKind`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rotation_core::cache::{CatalogCache, EntityCache};
//!
//! let entities = EntityCache::new(cache_dir)?;
//! let mut cache = CatalogCache::new(&catalog, entities).with_refresh(false);
//!
//! let playlists = cache.playlists("someone")?;
//! cache.invalidate_playlist(&playlists.playlists[0].id)?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::catalog::{
    Catalog, fetch_all_album_tracks, fetch_all_artist_albums, fetch_all_playlist_tracks,
    fetch_all_playlists, fetch_tracks,
};
use crate::error::{CacheError, Error, Result};
use crate::model::{
    AlbumId, ArtistId, FullAlbum, FullTrack, PlaylistId, PlaylistTrack, SimpleAlbum, SimpleTrack,
    TrackId,
};
use crate::playlist::PlaylistSet;

/// File name of the persisted playlist summaries, inside the cache directory.
pub const SUMMARIES_FILE: &str = "playlists.json";

/// Kinds of cached entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// All playlists visible to a user, keyed by user.
    Playlists,
    /// A playlist's track listing, keyed by playlist ID.
    PlaylistTracks,
    /// A single album.
    Album,
    /// An album's tracks, keyed by album ID.
    AlbumTracks,
    /// An artist's albums, keyed by artist ID.
    ArtistAlbums,
    /// A single track.
    Track,
}

impl CacheKind {
    /// Every kind, longest file prefix first so prefix matching is unambiguous.
    const BY_PREFIX: [Self; 6] = [
        Self::ArtistAlbums,
        Self::AlbumTracks,
        Self::Playlists,
        Self::PlaylistTracks,
        Self::Album,
        Self::Track,
    ];

    /// File name prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Playlists => "playlists",
            Self::PlaylistTracks => "playlist",
            Self::Album => "album",
            Self::AlbumTracks => "album-tracks",
            Self::ArtistAlbums => "artist-albums",
            Self::Track => "track",
        }
    }

    /// Cache file name for an entity of this kind.
    #[must_use]
    pub fn file_name(self, id: &str) -> String {
        format!("{}-{id}.json", self.prefix())
    }

    /// Parse a cache file name back into its kind and ID.
    #[must_use]
    pub fn parse_file_name(name: &str) -> Option<(Self, &str)> {
        let stem = name.strip_suffix(".json")?;
        Self::BY_PREFIX.into_iter().find_map(|kind| {
            stem.strip_prefix(kind.prefix())
                .and_then(|rest| rest.strip_prefix('-'))
                .filter(|id| !id.is_empty())
                .map(|id| (kind, id))
        })
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Identity of one cache file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Entity kind.
    pub kind: CacheKind,
    /// Remote ID, or user name for [`CacheKind::Playlists`].
    pub id: String,
}

impl CacheKey {
    /// Create a key.
    pub fn new(kind: CacheKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// File name for this key.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.kind.file_name(&self.id)
    }
}

/// A cached value, one variant per [`CacheKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// See [`CacheKind::Playlists`].
    Playlists(PlaylistSet),
    /// See [`CacheKind::PlaylistTracks`].
    PlaylistTracks(Vec<PlaylistTrack>),
    /// See [`CacheKind::Album`].
    Album(FullAlbum),
    /// See [`CacheKind::AlbumTracks`].
    AlbumTracks(Vec<SimpleTrack>),
    /// See [`CacheKind::ArtistAlbums`].
    ArtistAlbums(Vec<SimpleAlbum>),
    /// See [`CacheKind::Track`].
    Track(FullTrack),
}

impl CachedValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> CacheKind {
        match self {
            Self::Playlists(_) => CacheKind::Playlists,
            Self::PlaylistTracks(_) => CacheKind::PlaylistTracks,
            Self::Album(_) => CacheKind::Album,
            Self::AlbumTracks(_) => CacheKind::AlbumTracks,
            Self::ArtistAlbums(_) => CacheKind::ArtistAlbums,
            Self::Track(_) => CacheKind::Track,
        }
    }
}

/// A Rust type that is stored in the cache under one fixed kind.
pub trait CacheEntity: Serialize + DeserializeOwned + Clone {
    /// Kind this type is stored under.
    const KIND: CacheKind;

    /// Wrap into the closed value set.
    fn into_value(self) -> CachedValue;

    /// Unwrap from the closed value set; `None` on a kind mismatch.
    fn from_value(value: CachedValue) -> Option<Self>;
}

macro_rules! cache_entity {
    ($ty:ty, $variant:ident) => {
        impl CacheEntity for $ty {
            const KIND: CacheKind = CacheKind::$variant;

            fn into_value(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_value(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

cache_entity!(PlaylistSet, Playlists);
cache_entity!(Vec<PlaylistTrack>, PlaylistTracks);
cache_entity!(FullAlbum, Album);
cache_entity!(Vec<SimpleTrack>, AlbumTracks);
cache_entity!(Vec<SimpleAlbum>, ArtistAlbums);
cache_entity!(FullTrack, Track);

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    /// The entity.
    pub value: T,
    /// Whether it came from the cache rather than the fetcher.
    pub from_cache: bool,
}

/// Keyed JSON file store with an in-memory memo in front of it.
#[derive(Debug)]
pub struct EntityCache {
    dir: PathBuf,
    memo: HashMap<CacheKey, CachedValue>,
}

impl EntityCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| CacheError::CreateDirFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }

        debug!("Entity cache at {}", dir.display());

        Ok(Self {
            dir,
            memo: HashMap::new(),
        })
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Path of the summaries file.
    #[must_use]
    pub fn summaries_path(&self) -> PathBuf {
        self.dir.join(SUMMARIES_FILE)
    }

    /// Get an entity, fetching and storing it on a miss or when forced.
    ///
    /// A cached file that fails to decode is an error; it is never replaced
    /// by a silent refetch.
    pub fn get<T: CacheEntity>(
        &mut self,
        id: &str,
        force_refresh: bool,
        fetch: impl FnOnce() -> Result<T>,
    ) -> Result<Cached<T>> {
        let key = CacheKey::new(T::KIND, id);

        if !force_refresh
            && let Some(value) = self.peek::<T>(id)?
        {
            return Ok(Cached {
                value,
                from_cache: true,
            });
        }

        debug!("Cache miss for {}, fetching", key.file_name());
        let value = fetch()?;
        self.put(id, &value)?;

        Ok(Cached {
            value,
            from_cache: false,
        })
    }

    /// Read an entity without fetching. `Ok(None)` when nothing is cached.
    pub fn peek<T: CacheEntity>(&mut self, id: &str) -> Result<Option<T>> {
        let key = CacheKey::new(T::KIND, id);

        if let Some(value) = self.memo.get(&key).cloned().and_then(T::from_value) {
            debug!("Memo hit for {}", key.file_name());
            return Ok(Some(value));
        }

        let path = self.path_for(&key);
        let Some(value) = read_json_file::<T>(&path)? else {
            return Ok(None);
        };

        debug!("Cache hit for {}", path.display());
        self.memo.insert(key, value.clone().into_value());
        Ok(Some(value))
    }

    /// Store an entity, replacing whatever was cached under its key.
    pub fn put<T: CacheEntity>(&mut self, id: &str, value: &T) -> Result<()> {
        let key = CacheKey::new(T::KIND, id);
        let path = self.path_for(&key);

        let content = serde_json::to_string(value)?;
        write_atomic(&path, content.as_bytes())?;

        self.memo.insert(key, value.clone().into_value());
        Ok(())
    }

    /// Remove one entity. Removing something that is not cached is a no-op.
    pub fn invalidate(&mut self, kind: CacheKind, id: &str) -> Result<()> {
        let key = CacheKey::new(kind, id);
        self.memo.remove(&key);
        remove_if_exists(&self.path_for(&key))?;
        Ok(())
    }

    /// Remove every entity of `kind`, or only `owner`'s entry when given.
    ///
    /// Returns the number of files removed.
    pub fn invalidate_all(&mut self, kind: CacheKind, owner: Option<&str>) -> Result<usize> {
        if let Some(owner) = owner {
            let key = CacheKey::new(kind, owner);
            self.memo.remove(&key);
            return Ok(usize::from(remove_if_exists(&self.path_for(&key))?));
        }

        self.memo.retain(|key, _| key.kind != kind);

        let entries = fs::read_dir(&self.dir).map_err(|e| CacheError::ReadFailed {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let matches = name
                .to_str()
                .and_then(CacheKind::parse_file_name)
                .is_some_and(|(found, _)| found == kind);

            if matches && remove_if_exists(&entry.path())? {
                removed += 1;
            }
        }

        info!("Invalidated {} cached {} files", removed, kind);
        Ok(removed)
    }

    /// Drop the in-memory memo; files are untouched.
    pub fn clear_memo(&mut self) {
        self.memo.clear();
    }
}

/// Read and decode a JSON file. `Ok(None)` when the file does not exist.
pub fn read_json_file<T: DeserializeOwned>(
    path: &Path,
) -> std::result::Result<Option<T>, CacheError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CacheError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write `content` to `path` through a temporary file in the same directory.
///
/// Readers see either the old file or the new one, never a partial write.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::result::Result<(), CacheError> {
    let write_failed = |reason: String| CacheError::WriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_failed(e.to_string()))?;
    temp.write_all(content)
        .and_then(|()| temp.flush())
        .map_err(|e| write_failed(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| write_failed(e.error.to_string()))?;

    Ok(())
}

/// Remove a file, treating "not found" as success. Returns whether a file was removed.
fn remove_if_exists(path: &Path) -> std::result::Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::RemoveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Default cache directory for the platform.
#[must_use]
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("rotation")
}

// =============================================================================
// Catalog-backed cache
// =============================================================================

/// Typed cache reads backed by a [`Catalog`].
///
/// With `refresh` set, playlist listings and playlist track lists are
/// refetched the first time they are requested in this instance; later
/// requests reuse the refreshed copy.
pub struct CatalogCache<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    entities: EntityCache,
    refresh: bool,
    refreshed: HashSet<CacheKey>,
}

impl<'a, C: Catalog + ?Sized> CatalogCache<'a, C> {
    /// Bind an entity cache to a catalog.
    pub fn new(catalog: &'a C, entities: EntityCache) -> Self {
        Self {
            catalog,
            entities,
            refresh: false,
            refreshed: HashSet::new(),
        }
    }

    /// Force refetching of playlist listings and track lists.
    #[must_use]
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Whether refresh mode is on.
    #[must_use]
    pub const fn refresh(&self) -> bool {
        self.refresh
    }

    /// The catalog behind this cache.
    #[must_use]
    pub const fn catalog(&self) -> &'a C {
        self.catalog
    }

    /// The underlying entity cache.
    #[must_use]
    pub const fn entities(&self) -> &EntityCache {
        &self.entities
    }

    /// The underlying entity cache, mutably.
    pub fn entities_mut(&mut self) -> &mut EntityCache {
        &mut self.entities
    }

    fn should_force(&mut self, kind: CacheKind, id: &str) -> bool {
        self.refresh && self.refreshed.insert(CacheKey::new(kind, id))
    }

    /// Every playlist visible to `user`.
    pub fn playlists(&mut self, user: &str) -> Result<PlaylistSet> {
        let force = self.should_force(CacheKind::Playlists, user);
        let catalog = self.catalog;
        let cached = self.entities.get(user, force, || {
            Ok(fetch_all_playlists(catalog, user)?)
        })?;
        Ok(cached.value)
    }

    /// A playlist's full track listing.
    pub fn playlist_tracks(&mut self, playlist: &PlaylistId) -> Result<Vec<PlaylistTrack>> {
        let force = self.should_force(CacheKind::PlaylistTracks, playlist.as_str());
        let catalog = self.catalog;
        let cached = self.entities.get(playlist.as_str(), force, || {
            Ok(fetch_all_playlist_tracks(catalog, playlist)?)
        })?;
        Ok(cached.value)
    }

    /// A single album.
    pub fn album(&mut self, album: &AlbumId) -> Result<FullAlbum> {
        let catalog = self.catalog;
        let cached = self
            .entities
            .get(album.as_str(), false, || Ok(catalog.album(album)?))?;
        Ok(cached.value)
    }

    /// An album's tracks.
    pub fn album_tracks(&mut self, album: &AlbumId) -> Result<Vec<SimpleTrack>> {
        let catalog = self.catalog;
        let cached = self.entities.get(album.as_str(), false, || {
            Ok(fetch_all_album_tracks(catalog, album)?)
        })?;
        Ok(cached.value)
    }

    /// An artist's albums.
    pub fn artist_albums(&mut self, artist: &ArtistId) -> Result<Vec<SimpleAlbum>> {
        let catalog = self.catalog;
        let cached = self.entities.get(artist.as_str(), false, || {
            Ok(fetch_all_artist_albums(catalog, artist)?)
        })?;
        Ok(cached.value)
    }

    /// Full tracks for `ids`, in input order.
    ///
    /// Only IDs without a cached track are requested from the catalog. IDs
    /// the catalog does not know are left out of the result.
    pub fn tracks(&mut self, ids: &[TrackId]) -> Result<Vec<FullTrack>> {
        let mut found: HashMap<TrackId, FullTrack> = HashMap::new();
        let mut missing = Vec::new();
        let mut queued = HashSet::new();

        for id in ids {
            if found.contains_key(id) || queued.contains(id) {
                continue;
            }
            match self.entities.peek::<FullTrack>(id.as_str())? {
                Some(track) => {
                    found.insert(id.clone(), track);
                }
                None => {
                    queued.insert(id.clone());
                    missing.push(id.clone());
                }
            }
        }

        if !missing.is_empty() {
            debug!("Fetching {} uncached tracks", missing.len());
            for track in fetch_tracks(self.catalog, &missing).map_err(Error::from)? {
                if let Some(id) = track.id.clone() {
                    self.entities.put(id.as_str(), &track)?;
                    found.insert(id, track);
                }
            }
        }

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    /// Drop a playlist's cached track list.
    pub fn invalidate_playlist(&mut self, playlist: &PlaylistId) -> Result<()> {
        info!("Invalidating playlist {}", playlist);
        self.entities
            .invalidate(CacheKind::PlaylistTracks, playlist.as_str())
    }

    /// Drop a user's cached playlist listing.
    pub fn invalidate_user(&mut self, user: &str) -> Result<()> {
        info!("Invalidating playlists of {}", user);
        self.entities
            .invalidate_all(CacheKind::Playlists, Some(user))
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogPlaylist, MockCatalog, PlaylistOwner};
    use crate::error::CatalogError;
    use tempfile::TempDir;

    fn full_track(id: &str) -> FullTrack {
        FullTrack {
            id: Some(TrackId::new(id)),
            name: format!("Song {id}"),
            album: SimpleAlbum {
                id: None,
                name: "Record".to_string(),
                album_type: None,
                release_date: None,
                artists: Vec::new(),
                images: Vec::new(),
            },
            artists: Vec::new(),
            duration_ms: 1000,
            popularity: 0,
        }
    }

    fn entry(id: &str) -> PlaylistTrack {
        PlaylistTrack {
            added_at: "2023-03-01T10:00:00Z".to_string(),
            track: Some(full_track(id)),
        }
    }

    fn json_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_cache_kind_file_names() {
        assert_eq!(CacheKind::Playlists.file_name("bob"), "playlists-bob.json");
        assert_eq!(CacheKind::PlaylistTracks.file_name("p1"), "playlist-p1.json");
        assert_eq!(CacheKind::AlbumTracks.file_name("a1"), "album-tracks-a1.json");
        assert_eq!(CacheKind::ArtistAlbums.file_name("r1"), "artist-albums-r1.json");
    }

    #[test]
    fn test_parse_file_name_prefers_longest_prefix() {
        assert_eq!(
            CacheKind::parse_file_name("album-tracks-a1.json"),
            Some((CacheKind::AlbumTracks, "a1"))
        );
        assert_eq!(
            CacheKind::parse_file_name("album-a1.json"),
            Some((CacheKind::Album, "a1"))
        );
        assert_eq!(
            CacheKind::parse_file_name("playlists-bob.json"),
            Some((CacheKind::Playlists, "bob"))
        );
        assert_eq!(CacheKind::parse_file_name(SUMMARIES_FILE), None);
        assert_eq!(CacheKind::parse_file_name("playlist-.json"), None);
    }

    #[test]
    fn test_get_fetches_once_then_serves_cache() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        let mut fetches = 0;

        let first = cache
            .get("p1", false, || {
                fetches += 1;
                Ok(vec![entry("a"), entry("b")])
            })
            .expect("first get");
        assert!(!first.from_cache);
        assert_eq!(fetches, 1);
        assert_eq!(json_files(temp_dir.path()), vec!["playlist-p1.json"]);

        let second: Cached<Vec<PlaylistTrack>> = cache
            .get("p1", false, || {
                fetches += 1;
                Ok(Vec::new())
            })
            .expect("second get");
        assert!(second.from_cache);
        assert_eq!(fetches, 1);
        assert_eq!(second.value, first.value);

        cache
            .invalidate(CacheKind::PlaylistTracks, "p1")
            .expect("invalidate");
        assert!(json_files(temp_dir.path()).is_empty());

        let third = cache
            .get("p1", false, || {
                fetches += 1;
                Ok(vec![entry("c")])
            })
            .expect("third get");
        assert!(!third.from_cache);
        assert_eq!(fetches, 2);
        assert_eq!(third.value.len(), 1);
    }

    #[test]
    fn test_new_instance_reads_existing_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        {
            let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
            cache.put("t1", &full_track("t1")).expect("put");
        }

        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        let cached = cache
            .get::<FullTrack>("t1", false, || panic!("should not fetch"))
            .expect("get");
        assert!(cached.from_cache);
        assert_eq!(cached.value.name, "Song t1");
    }

    #[test]
    fn test_force_refresh_refetches() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        cache.put("t1", &full_track("t1")).expect("put");

        let mut renamed = full_track("t1");
        renamed.name = "Renamed".to_string();
        let cached = cache
            .get("t1", true, || Ok(renamed.clone()))
            .expect("get");
        assert!(!cached.from_cache);

        cache.clear_memo();
        let reread: Option<FullTrack> = cache.peek("t1").expect("peek");
        assert_eq!(reread.unwrap().name, "Renamed");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("playlist-p1.json"), "{not json").unwrap();

        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        let result = cache.get::<Vec<PlaylistTrack>>("p1", false, || Ok(Vec::new()));

        assert!(matches!(
            result,
            Err(Error::Cache(CacheError::Corrupt { .. }))
        ));
    }

    #[test]
    fn test_invalidate_missing_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        cache
            .invalidate(CacheKind::Track, "nothing")
            .expect("invalidate twice is fine");
        cache
            .invalidate(CacheKind::Track, "nothing")
            .expect("invalidate twice is fine");
    }

    #[test]
    fn test_invalidate_all_only_touches_kind() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut cache = EntityCache::new(temp_dir.path()).expect("cache");
        cache.put("t1", &full_track("t1")).expect("put");
        cache.put("t2", &full_track("t2")).expect("put");
        cache.put("p1", &vec![entry("t1")]).expect("put");
        cache.put::<Vec<SimpleTrack>>("a1", &Vec::new()).expect("put");

        let removed = cache
            .invalidate_all(CacheKind::Track, None)
            .expect("invalidate all");
        assert_eq!(removed, 2);
        assert_eq!(
            json_files(temp_dir.path()),
            vec!["album-tracks-a1.json", "playlist-p1.json"]
        );
        assert!(cache.peek::<FullTrack>("t1").expect("peek").is_none());

        let removed = cache
            .invalidate_all(CacheKind::Album, None)
            .expect("invalidate albums");
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("track-t1.json");
        write_atomic(&path, b"{}").expect("write");
        write_atomic(&path, b"[]").expect("overwrite");

        assert_eq!(json_files(temp_dir.path()), vec!["track-t1.json"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_catalog_cache_playlists_fetched_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut catalog = MockCatalog::new();
        catalog.expect_playlists_page().times(1).returning(|_, _, _| {
            Ok(vec![CatalogPlaylist {
                id: PlaylistId::new("p1"),
                name: "2023 march".to_string(),
                owner: PlaylistOwner {
                    id: "bob".to_string(),
                },
                images: None,
                snapshot_id: "s1".to_string(),
            }])
        });

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities);

        let first = cache.playlists("bob").expect("first");
        let second = cache.playlists("bob").expect("second");
        assert_eq!(first, second);
        assert!(temp_dir.path().join("playlists-bob.json").exists());

        cache.invalidate_user("bob").expect("invalidate");
        assert!(!temp_dir.path().join("playlists-bob.json").exists());
    }

    #[test]
    fn test_catalog_cache_refresh_refetches_once_per_instance() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        {
            let mut entities = EntityCache::new(temp_dir.path()).expect("cache");
            entities.put("p1", &vec![entry("old")]).expect("put");
        }

        let mut catalog = MockCatalog::new();
        catalog
            .expect_playlist_tracks_page()
            .times(1)
            .returning(|_, _, _| Ok(vec![entry("new")]));

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities).with_refresh(true);
        let id = PlaylistId::new("p1");

        let first = cache.playlist_tracks(&id).expect("first");
        let second = cache.playlist_tracks(&id).expect("second");
        assert_eq!(first[0].track_id(), Some(&TrackId::new("new")));
        assert_eq!(first, second);
    }

    #[test]
    fn test_catalog_cache_tracks_fetches_only_missing_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut catalog = MockCatalog::new();
        catalog
            .expect_tracks()
            .withf(|ids| ids.len() == 2 && ids[0].as_str() == "b" && ids[1].as_str() == "d")
            .times(1)
            .returning(|ids| Ok(ids.iter().map(|id| full_track(id.as_str())).collect()));

        let mut entities = EntityCache::new(temp_dir.path()).expect("cache");
        entities.put("a", &full_track("a")).expect("put");
        entities.put("c", &full_track("c")).expect("put");
        let mut cache = CatalogCache::new(&catalog, entities);

        let ids: Vec<TrackId> = ["d", "a", "b", "c", "b"].into_iter().map(TrackId::new).collect();
        let tracks = cache.tracks(&ids).expect("tracks");
        let names: Vec<&str> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Song d", "Song a", "Song b", "Song c", "Song b"]);
        assert!(temp_dir.path().join("track-b.json").exists());
        assert!(temp_dir.path().join("track-d.json").exists());

        // Everything is cached now.
        let again = cache.tracks(&ids[..2]).expect("cached tracks");
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_catalog_cache_fetch_error_writes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut catalog = MockCatalog::new();
        catalog
            .expect_album()
            .returning(|_| Err(CatalogError::Transport("offline".to_string())));

        let entities = EntityCache::new(temp_dir.path()).expect("cache");
        let mut cache = CatalogCache::new(&catalog, entities);

        let err = cache.album(&AlbumId::new("a1")).unwrap_err();
        assert!(matches!(err, Error::Catalog(CatalogError::Transport(_))));
        assert!(json_files(temp_dir.path()).is_empty());
    }
}
