//! Sets of track IDs and sampling without replacement.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::model::{PlaylistTrack, TrackId};

/// An unordered set of track IDs.
///
/// Enumeration order is the IDs' sort order, so a given set always
/// enumerates the same way and seeded sampling is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSet {
    ids: BTreeSet<TrackId>,
}

impl TrackSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Set of every identified track in a playlist listing.
    #[must_use]
    pub fn from_playlist(tracks: &[PlaylistTrack]) -> Self {
        let mut set = Self::new();
        set.merge(tracks);
        set
    }

    /// Add every identified track of a listing. Entries without an ID
    /// (local files, removed tracks) are skipped.
    pub fn merge(&mut self, tracks: &[PlaylistTrack]) -> &mut Self {
        self.ids
            .extend(tracks.iter().filter_map(PlaylistTrack::track_id).cloned());
        self
    }

    /// Add IDs.
    pub fn merge_ids<I: IntoIterator<Item = TrackId>>(&mut self, ids: I) -> &mut Self {
        self.ids.extend(ids);
        self
    }

    /// Add one ID. Returns whether it was new.
    pub fn insert(&mut self, id: TrackId) -> bool {
        self.ids.insert(id)
    }

    /// IDs in this set that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            ids: self.ids.difference(&other.ids).cloned().collect(),
        }
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }

    /// Number of IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.ids.iter()
    }

    /// The IDs in enumeration order.
    #[must_use]
    pub fn to_ordered(&self) -> Vec<TrackId> {
        self.ids.iter().cloned().collect()
    }

    /// Pick exactly `n` distinct IDs uniformly at random.
    ///
    /// Fails without drawing anything when the set has fewer than `n` IDs.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> std::result::Result<Self, SamplingError> {
        if n > self.ids.len() {
            return Err(SamplingError::InsufficientPopulation {
                requested: n,
                available: self.ids.len(),
            });
        }

        let universe = self.to_ordered();
        let picked = rand::seq::index::sample(rng, universe.len(), n);

        Ok(Self {
            ids: picked.into_iter().map(|i| universe[i].clone()).collect(),
        })
    }
}

impl FromIterator<TrackId> for TrackSet {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TrackSet {
    type Item = TrackId;
    type IntoIter = std::collections::btree_set::IntoIter<TrackId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a TrackSet {
    type Item = &'a TrackId;
    type IntoIter = std::collections::btree_set::Iter<'a, TrackId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
