//! Playlists as seen by a user, and the monthly-playlist name filter.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Image, PlaylistId};

/// Matches `"<four ASCII digit year> <full English month name>"`, any case.
static MONTHLY_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^[0-9]{4} ",
        r"(january|february|march|april|may|june|",
        r"july|august|september|october|november|december)$",
    ))
    .ok()
});

/// A playlist visible to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Catalog ID.
    pub id: PlaylistId,
    /// The user whose listing this playlist was found in.
    pub user: String,
    /// The user who owns the playlist.
    pub owner: String,
    /// Display name.
    pub name: String,
    /// Cover images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Catalog version marker; changes whenever the track list changes.
    pub snapshot_id: String,
}

impl Playlist {
    /// Whether this playlist is a monthly source playlist.
    #[must_use]
    pub fn is_monthly(&self) -> bool {
        is_monthly_playlist_name(&self.name)
    }

    /// Whether the listing user follows someone else's playlist.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.owner != self.user
    }
}

/// All playlists visible to one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSet {
    /// Playlists in catalog listing order.
    pub playlists: Vec<Playlist>,
}

impl PlaylistSet {
    /// Create a set from a list of playlists.
    #[must_use]
    pub const fn new(playlists: Vec<Playlist>) -> Self {
        Self { playlists }
    }

    /// The monthly source playlists, in listing order.
    #[must_use]
    pub fn monthly(&self) -> Self {
        Self {
            playlists: self
                .playlists
                .iter()
                .filter(|p| p.is_monthly())
                .cloned()
                .collect(),
        }
    }

    /// First playlist whose name equals `name`, ignoring case.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| names_match(&p.name, name))
    }

    /// Number of playlists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// Whether there are no playlists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Iterate over the playlists.
    pub fn iter(&self) -> std::slice::Iter<'_, Playlist> {
        self.playlists.iter()
    }
}

impl<'a> IntoIterator for &'a PlaylistSet {
    type Item = &'a Playlist;
    type IntoIter = std::slice::Iter<'a, Playlist>;

    fn into_iter(self) -> Self::IntoIter {
        self.playlists.iter()
    }
}

/// Whether `name` has the `"<year> <month>"` shape of a monthly playlist.
#[must_use]
pub fn is_monthly_playlist_name(name: &str) -> bool {
    MONTHLY_NAME.as_ref().is_some_and(|re| re.is_match(name))
}

/// Case-insensitive playlist name comparison.
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
