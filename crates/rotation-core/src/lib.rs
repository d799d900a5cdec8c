//! `Rotation` Core Library
//!
//! This crate provides the core functionality for the `Rotation` tool:
//! - Catalog access with offset pagination (`catalog`)
//! - An on-disk entity cache with explicit invalidation (`cache`)
//! - Track sets with difference and sampling without replacement (`track_set`)
//! - Playlist summaries with snapshot drift detection (`summary`)
//! - Batched remove-then-add reconciliation (`reconcile`)
//! - The sync orchestrator tying them together (`sync`)
//! - A read-only view of the cache for querying (`library`)
//! - Application configuration management (`config`)
//!
//! # Error Handling
//!
//! Every operation returns [`Result`]; errors are typed per domain and
//! classified with [`Error::kind`]. See the [`error`] module for details.
//!
//! ```rust,ignore
//! use rotation_core::{Error, ErrorKind, Result};
//!
//! fn run() -> Result<()> {
//!     // Your code here
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod library;
pub mod model;
pub mod playlist;
pub mod reconcile;
pub mod summary;
pub mod sync;
pub mod track_set;
pub mod update;

pub use cache::{
    CacheEntity, CacheKey, CacheKind, Cached, CachedValue, CatalogCache, EntityCache,
    SUMMARIES_FILE, default_cache_directory,
};
pub use catalog::{
    Catalog, CatalogPlaylist, DEFAULT_API_BASE_URL, PlaylistOwner, WebCatalog,
    fetch_all_album_tracks, fetch_all_artist_albums, fetch_all_playlist_tracks,
    fetch_all_playlists, fetch_tracks, find_playlist_by_name,
};
pub use config::{AppConfig, ServerConfig};
pub use error::{
    CacheError, CatalogError, CatalogResult, Error, ErrorKind, Mutation, ReconcileError, Result,
    SamplingError, SummaryError,
};
pub use library::{
    AlbumRef, ArtistRef, DEFAULT_MAX_AGE, LoadedPlaylist, PlaylistLibrary, PlaylistRef,
    SearchResults, SearchTrack,
};
pub use model::{
    AlbumId, ArtistId, FullAlbum, FullTrack, Image, PlaylistId, PlaylistTrack, SimpleAlbum,
    SimpleArtist, SimpleTrack, TrackId,
};
pub use playlist::{Playlist, PlaylistSet, is_monthly_playlist_name};
pub use reconcile::{MUTATION_BATCH_SIZE, ReconcileOutcome, Reconciler};
pub use summary::{
    PlaylistSummaries, PlaylistSummary, PlaylistUser, SummaryOutcome, summarize, summarize_all,
};
pub use sync::{
    DEFAULT_PLAYLIST_NAME, DEFAULT_SAMPLE_SIZE, SyncOptions, SyncOrchestrator, SyncPhase,
    SyncReport,
};
pub use track_set::TrackSet;
pub use update::PlaylistUpdate;
