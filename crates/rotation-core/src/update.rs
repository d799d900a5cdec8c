//! Before/after diff of a playlist's membership.

use crate::model::TrackId;
use crate::track_set::TrackSet;

/// Plan for moving a playlist from its current tracks to a new list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistUpdate {
    before: TrackSet,
    after: Vec<TrackId>,
}

impl PlaylistUpdate {
    /// Start a plan from the playlist's current tracks.
    #[must_use]
    pub const fn new(before: TrackSet) -> Self {
        Self {
            before,
            after: Vec::new(),
        }
    }

    /// Record a track that should be in the playlist afterwards.
    pub fn add_track(&mut self, id: TrackId) {
        self.after.push(id);
    }

    /// Current tracks that are not wanted afterwards.
    #[must_use]
    pub fn ids_to_remove(&self) -> Vec<TrackId> {
        let after: TrackSet = self.after.iter().cloned().collect();
        self.before.difference(&after).to_ordered()
    }

    /// Wanted tracks that are not present yet, in the order they were added.
    #[must_use]
    pub fn ids_to_add(&self) -> Vec<TrackId> {
        let mut seen = TrackSet::new();
        self.after
            .iter()
            .filter(|id| !self.before.contains(id) && seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    /// Treat every added track as present.
    pub fn merge_before_and_to_add(&mut self) {
        self.before.merge_ids(self.after.iter().cloned());
    }

    /// Tracks considered present.
    #[must_use]
    pub const fn before(&self) -> &TrackSet {
        &self.before
    }

    /// Tracks recorded with [`Self::add_track`], in order.
    #[must_use]
    pub fn after(&self) -> &[TrackId] {
        &self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<TrackId> {
        raw.iter().map(|id| TrackId::new(*id)).collect()
    }

    fn plan(before: &[&str], after: &[&str]) -> PlaylistUpdate {
        let mut update = PlaylistUpdate::new(ids(before).into_iter().collect());
        for id in ids(after) {
            update.add_track(id);
        }
        update
    }

    #[test]
    fn test_remove_and_add_are_set_differences() {
        let update = plan(&["a", "b", "c"], &["c", "e", "d"]);
        assert_eq!(update.ids_to_remove(), ids(&["a", "b"]));
        assert_eq!(update.ids_to_add(), ids(&["e", "d"]));
    }

    #[test]
    fn test_disjoint_plan_replaces_everything() {
        let update = plan(&["a", "b"], &["d", "c"]);
        assert_eq!(update.ids_to_remove(), ids(&["a", "b"]));
        assert_eq!(update.ids_to_add(), ids(&["d", "c"]));
    }

    #[test]
    fn test_duplicate_additions_are_added_once() {
        let update = plan(&[], &["x", "y", "x"]);
        assert_eq!(update.ids_to_add(), ids(&["x", "y"]));
    }

    #[test]
    fn test_merge_before_and_to_add() {
        let mut update = plan(&["a"], &["b"]);
        update.merge_before_and_to_add();
        assert!(update.ids_to_add().is_empty());
        assert!(update.before().contains(&TrackId::new("b")));
        assert_eq!(update.ids_to_remove(), ids(&["a"]));
    }
}
