//! Catalog entities as they are fetched, cached and served.
//!
//! Field names follow the catalog's JSON so that a cache file is exactly
//! the serialized response payload.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw catalog identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Catalog identifier of a track.
    TrackId
);
id_type!(
    /// Catalog identifier of a playlist.
    PlaylistId
);
id_type!(
    /// Catalog identifier of an album.
    AlbumId
);
id_type!(
    /// Catalog identifier of an artist.
    ArtistId
);

/// Cover image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Width in pixels, when known.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels, when known.
    #[serde(default)]
    pub height: Option<u32>,
}

/// Artist reference embedded in tracks and albums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleArtist {
    /// Artist ID (absent for local files).
    #[serde(default)]
    pub id: Option<ArtistId>,
    /// Display name.
    pub name: String,
}

/// Album reference embedded in tracks and artist album listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleAlbum {
    /// Album ID (absent for local files).
    #[serde(default)]
    pub id: Option<AlbumId>,
    /// Display name.
    pub name: String,
    /// Album, single, compilation...
    #[serde(default)]
    pub album_type: Option<String>,
    /// Release date as reported by the catalog.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Credited artists.
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    /// Cover images.
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Full album as returned by a single-album lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullAlbum {
    /// Album ID.
    pub id: AlbumId,
    /// Display name.
    pub name: String,
    /// Album, single, compilation...
    #[serde(default)]
    pub album_type: Option<String>,
    /// Release date as reported by the catalog.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Record label.
    #[serde(default)]
    pub label: Option<String>,
    /// Credited artists.
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    /// Cover images.
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Track without album information, as listed inside an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTrack {
    /// Track ID (absent for local files).
    #[serde(default)]
    pub id: Option<TrackId>,
    /// Track title.
    pub name: String,
    /// Credited artists.
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Position on its disc.
    #[serde(default)]
    pub track_number: u32,
}

/// Full track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTrack {
    /// Track ID (absent for local files).
    #[serde(default)]
    pub id: Option<TrackId>,
    /// Track title.
    pub name: String,
    /// Album the track belongs to.
    pub album: SimpleAlbum,
    /// Credited artists.
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Popularity score, 0-100.
    #[serde(default)]
    pub popularity: u32,
}

impl FullTrack {
    /// Names of all credited artists, in credit order.
    #[must_use]
    pub fn artist_names(&self) -> Vec<String> {
        self.artists.iter().map(|a| a.name.clone()).collect()
    }
}

/// One entry of a playlist's track listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    /// When the track was added, `YYYY-MM-DDTHH:MM:SSZ`.
    pub added_at: String,
    /// The track; the catalog reports `null` for removed items.
    #[serde(default)]
    pub track: Option<FullTrack>,
}

impl PlaylistTrack {
    /// ID of the listed track, if it has one.
    #[must_use]
    pub fn track_id(&self) -> Option<&TrackId> {
        self.track.as_ref().and_then(|t| t.id.as_ref())
    }
}
