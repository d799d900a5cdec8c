//! Remote music catalog access.
//!
//! [`Catalog`] is the seam between the sync engine and the remote service.
//! It exposes single pages and single mutations; the free functions in this
//! module walk the offset-based pagination on top of it:
//!
//! - a page is requested with a fixed `limit` and a growing `offset`
//! - listing stops at the first page holding fewer than `limit` items
//!
//! [`WebCatalog`] talks to a Spotify-compatible Web API using a bearer
//! token and the blocking `reqwest` client.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use crate::error::{CatalogError, CatalogResult};
use crate::model::{
    AlbumId, ArtistId, FullAlbum, FullTrack, Image, PlaylistId, PlaylistTrack, SimpleAlbum,
    SimpleTrack, TrackId,
};
use crate::playlist::{Playlist, PlaylistSet, names_match};

/// Page size when listing a user's playlists.
pub const PLAYLISTS_PAGE_SIZE: usize = 50;

/// Page size when looking up a playlist by name.
pub const PLAYLIST_LOOKUP_PAGE_SIZE: usize = 20;

/// Page size when listing a playlist's tracks.
pub const PLAYLIST_TRACKS_PAGE_SIZE: usize = 100;

/// Page size when listing an album's tracks.
pub const ALBUM_TRACKS_PAGE_SIZE: usize = 50;

/// Page size when listing an artist's albums.
pub const ARTIST_ALBUMS_PAGE_SIZE: usize = 50;

/// Maximum IDs per bulk track lookup.
pub const TRACKS_LOOKUP_LIMIT: usize = 50;

/// Default catalog API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default timeout for catalog requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Owner reference on a listed playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    /// Owner user ID.
    pub id: String,
}

/// Playlist as it appears in a user's playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPlaylist {
    /// Playlist ID.
    pub id: PlaylistId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: PlaylistOwner,
    /// Cover images; the catalog may send `null`.
    #[serde(default)]
    pub images: Option<Vec<Image>>,
    /// Version marker.
    #[serde(default)]
    pub snapshot_id: String,
}

impl CatalogPlaylist {
    /// Convert into a [`Playlist`] as seen by `user`.
    #[must_use]
    pub fn into_playlist(self, user: &str) -> Playlist {
        Playlist {
            id: self.id,
            user: user.to_string(),
            owner: self.owner.id,
            name: self.name,
            images: self.images.unwrap_or_default(),
            snapshot_id: self.snapshot_id,
        }
    }
}

/// Remote catalog operations used by the sync engine.
#[cfg_attr(test, mockall::automock)]
pub trait Catalog {
    /// One page of the playlists visible to `user`.
    fn playlists_page(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<CatalogPlaylist>>;

    /// One page of a playlist's track listing.
    fn playlist_tracks_page(
        &self,
        playlist: &PlaylistId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<PlaylistTrack>>;

    /// A single album.
    fn album(&self, album: &AlbumId) -> CatalogResult<FullAlbum>;

    /// One page of an album's tracks.
    fn album_tracks_page(
        &self,
        album: &AlbumId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<SimpleTrack>>;

    /// One page of an artist's albums.
    fn artist_albums_page(
        &self,
        artist: &ArtistId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<SimpleAlbum>>;

    /// Full tracks for up to [`TRACKS_LOOKUP_LIMIT`] IDs. Unknown IDs are omitted.
    fn tracks(&self, ids: &[TrackId]) -> CatalogResult<Vec<FullTrack>>;

    /// Create a playlist owned by `user`.
    fn create_playlist(&self, user: &str, name: &str, public: bool) -> CatalogResult<PlaylistId>;

    /// Append tracks to a playlist.
    fn add_tracks(&self, playlist: &PlaylistId, ids: &[TrackId]) -> CatalogResult<()>;

    /// Remove every occurrence of the given tracks from a playlist.
    fn remove_tracks(&self, playlist: &PlaylistId, ids: &[TrackId]) -> CatalogResult<()>;
}

/// Walk offset pagination until a short page comes back.
fn collect_pages<T>(
    page_size: usize,
    mut fetch: impl FnMut(usize, usize) -> CatalogResult<Vec<T>>,
) -> CatalogResult<Vec<T>> {
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch(page_size, offset)?;
        let received = page.len();
        all.extend(page);

        if received < page_size {
            break;
        }

        offset += page_size;
    }

    Ok(all)
}

/// Every playlist visible to `user`.
pub fn fetch_all_playlists<C: Catalog + ?Sized>(
    catalog: &C,
    user: &str,
) -> CatalogResult<PlaylistSet> {
    let listed = collect_pages(PLAYLISTS_PAGE_SIZE, |limit, offset| {
        catalog.playlists_page(user, limit, offset)
    })?;

    debug!("Fetched {} playlists for {}", listed.len(), user);

    Ok(PlaylistSet::new(
        listed.into_iter().map(|p| p.into_playlist(user)).collect(),
    ))
}

/// Every entry of a playlist's track listing, in playlist order.
pub fn fetch_all_playlist_tracks<C: Catalog + ?Sized>(
    catalog: &C,
    playlist: &PlaylistId,
) -> CatalogResult<Vec<PlaylistTrack>> {
    let tracks = collect_pages(PLAYLIST_TRACKS_PAGE_SIZE, |limit, offset| {
        catalog.playlist_tracks_page(playlist, limit, offset)
    })?;

    debug!("Fetched {} tracks for playlist {}", tracks.len(), playlist);
    Ok(tracks)
}

/// Every track of an album.
pub fn fetch_all_album_tracks<C: Catalog + ?Sized>(
    catalog: &C,
    album: &AlbumId,
) -> CatalogResult<Vec<SimpleTrack>> {
    collect_pages(ALBUM_TRACKS_PAGE_SIZE, |limit, offset| {
        catalog.album_tracks_page(album, limit, offset)
    })
}

/// Every album of an artist.
pub fn fetch_all_artist_albums<C: Catalog + ?Sized>(
    catalog: &C,
    artist: &ArtistId,
) -> CatalogResult<Vec<SimpleAlbum>> {
    collect_pages(ARTIST_ALBUMS_PAGE_SIZE, |limit, offset| {
        catalog.artist_albums_page(artist, limit, offset)
    })
}

/// Full tracks for any number of IDs, looked up in bounded chunks.
pub fn fetch_tracks<C: Catalog + ?Sized>(
    catalog: &C,
    ids: &[TrackId],
) -> CatalogResult<Vec<FullTrack>> {
    let mut tracks = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(TRACKS_LOOKUP_LIMIT) {
        tracks.extend(catalog.tracks(chunk)?);
    }
    Ok(tracks)
}

/// First playlist of `user` whose name equals `name`, ignoring case.
///
/// Stops paging as soon as a match is found.
pub fn find_playlist_by_name<C: Catalog + ?Sized>(
    catalog: &C,
    user: &str,
    name: &str,
) -> CatalogResult<Option<Playlist>> {
    let mut offset = 0;

    loop {
        let page = catalog.playlists_page(user, PLAYLIST_LOOKUP_PAGE_SIZE, offset)?;
        let received = page.len();

        if let Some(found) = page.into_iter().find(|p| names_match(&p.name, name)) {
            return Ok(Some(found.into_playlist(user)));
        }

        if received < PLAYLIST_LOOKUP_PAGE_SIZE {
            return Ok(None);
        }

        offset += PLAYLIST_LOOKUP_PAGE_SIZE;
    }
}

// =============================================================================
// Web API implementation
// =============================================================================

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct TracksResponse {
    tracks: Vec<Option<FullTrack>>,
}

#[derive(Deserialize)]
struct CreatedPlaylist {
    id: PlaylistId,
}

/// Catalog backed by a Spotify-compatible Web API.
pub struct WebCatalog {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl WebCatalog {
    /// Create a client for `base_url` authenticating with `access_token`.
    pub fn new(base_url: &str, access_token: impl Into<String>) -> CatalogResult<Self> {
        Self::with_timeout(
            base_url,
            access_token,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> CatalogResult<Self> {
        let trimmed = base_url.trim_end_matches('/');
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(CatalogError::Transport(format!(
                "Catalog URL must start with http:// or https://, got {trimmed:?}"
            )));
        }

        let base_url = Url::parse(trimmed).map_err(|e| {
            CatalogError::Transport(format!("Invalid catalog URL {trimmed:?}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::Transport(format!(
                "Catalog URL cannot hold a path: {trimmed:?}"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("rotation/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            access_token: access_token.into(),
        })
    }

    /// Endpoint URL under the API root. Each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> CatalogResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::Transport("Catalog URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the body of a successful response.
    fn execute(&self, endpoint: &str, request: RequestBuilder) -> CatalogResult<String> {
        trace!("Catalog request {}", endpoint);

        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| CatalogError::Transport(format!("{endpoint}: {e}")))?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            CatalogError::Transport(format!("{endpoint}: failed to read body: {e}"))
        })?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CatalogError::Unauthorized {
                status: status.as_u16(),
                message: body,
            });
        }

        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                message: body,
            });
        }

        Ok(body)
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> CatalogResult<T> {
        serde_json::from_str(body).map_err(|e| CatalogError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        let url = self.url(segments)?;
        let endpoint = url.path().to_string();
        let body = self.execute(&endpoint, self.http.get(url).query(query))?;
        Self::decode(&endpoint, &body)
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<T>> {
        let page: Page<T> = self.get_json(
            segments,
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )?;
        Ok(page.items)
    }

    /// Send a JSON body to an endpoint and return the response body.
    fn send_json(
        &self,
        method: Method,
        segments: &[&str],
        body: &serde_json::Value,
    ) -> CatalogResult<(String, String)> {
        let url = self.url(segments)?;
        let endpoint = url.path().to_string();
        let request = self.http.request(method, url).json(body);
        let response = self.execute(&endpoint, request)?;
        Ok((endpoint, response))
    }
}

/// Catalog URI for a track ID.
#[must_use]
pub fn track_uri(id: &TrackId) -> String {
    format!("spotify:track:{id}")
}

impl Catalog for WebCatalog {
    fn playlists_page(
        &self,
        user: &str,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<CatalogPlaylist>> {
        self.get_page(&["users", user, "playlists"], limit, offset)
    }

    fn playlist_tracks_page(
        &self,
        playlist: &PlaylistId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<PlaylistTrack>> {
        self.get_page(&["playlists", playlist.as_str(), "tracks"], limit, offset)
    }

    fn album(&self, album: &AlbumId) -> CatalogResult<FullAlbum> {
        self.get_json(&["albums", album.as_str()], &[])
    }

    fn album_tracks_page(
        &self,
        album: &AlbumId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<SimpleTrack>> {
        self.get_page(&["albums", album.as_str(), "tracks"], limit, offset)
    }

    fn artist_albums_page(
        &self,
        artist: &ArtistId,
        limit: usize,
        offset: usize,
    ) -> CatalogResult<Vec<SimpleAlbum>> {
        self.get_page(&["artists", artist.as_str(), "albums"], limit, offset)
    }

    fn tracks(&self, ids: &[TrackId]) -> CatalogResult<Vec<FullTrack>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(TrackId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let response: TracksResponse = self.get_json(&["tracks"], &[("ids", joined)])?;
        Ok(response.tracks.into_iter().flatten().collect())
    }

    fn create_playlist(&self, user: &str, name: &str, public: bool) -> CatalogResult<PlaylistId> {
        let (endpoint, body) = self.send_json(
            Method::POST,
            &["users", user, "playlists"],
            &json!({ "name": name, "public": public }),
        )?;
        let created: CreatedPlaylist = Self::decode(&endpoint, &body)?;
        Ok(created.id)
    }

    fn add_tracks(&self, playlist: &PlaylistId, ids: &[TrackId]) -> CatalogResult<()> {
        let uris: Vec<String> = ids.iter().map(track_uri).collect();
        self.send_json(
            Method::POST,
            &["playlists", playlist.as_str(), "tracks"],
            &json!({ "uris": uris }),
        )?;
        Ok(())
    }

    fn remove_tracks(&self, playlist: &PlaylistId, ids: &[TrackId]) -> CatalogResult<()> {
        let tracks: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| json!({ "uri": track_uri(id) }))
            .collect();
        self.send_json(
            Method::DELETE,
            &["playlists", playlist.as_str(), "tracks"],
            &json!({ "tracks": tracks }),
        )?;
        Ok(())
    }
}
