//! Batched remove/add against the target playlist.
//!
//! Mutations are sent in fixed-size batches, one catalog call per batch,
//! in order. The first failing batch stops the operation; batches already
//! sent stay applied.

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{Mutation, ReconcileError};
use crate::model::{PlaylistId, TrackId};
use crate::update::PlaylistUpdate;

/// Maximum IDs per add or remove call.
pub const MUTATION_BATCH_SIZE: usize = 50;

/// Counts of what a reconciliation sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Tracks removed.
    pub removed: usize,
    /// Tracks added.
    pub added: usize,
    /// Catalog calls made.
    pub batches: usize,
}

/// Applies membership changes to one remote playlist.
pub struct Reconciler<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    batch_size: usize,
}

impl<'a, C: Catalog + ?Sized> Reconciler<'a, C> {
    /// Create a reconciler with the default batch size.
    pub const fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            batch_size: MUTATION_BATCH_SIZE,
        }
    }

    /// Use a different batch size. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Remove `ids` from `playlist`. Returns the number of batches sent.
    pub fn remove_all(
        &self,
        playlist: &PlaylistId,
        ids: &[TrackId],
    ) -> Result<usize, ReconcileError> {
        self.run(Mutation::Remove, playlist, ids)
    }

    /// Add `ids` to `playlist`. Returns the number of batches sent.
    pub fn add_all(&self, playlist: &PlaylistId, ids: &[TrackId]) -> Result<usize, ReconcileError> {
        self.run(Mutation::Add, playlist, ids)
    }

    /// Remove everything the plan drops, then add everything it adds.
    pub fn apply(
        &self,
        playlist: &PlaylistId,
        update: &PlaylistUpdate,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let to_remove = update.ids_to_remove();
        let to_add = update.ids_to_add();

        info!("Removing old tracks: {}", to_remove.len());
        let mut batches = self.remove_all(playlist, &to_remove)?;

        info!("Adding new tracks: {}", to_add.len());
        batches += self.add_all(playlist, &to_add)?;

        Ok(ReconcileOutcome {
            removed: to_remove.len(),
            added: to_add.len(),
            batches,
        })
    }

    fn run(
        &self,
        operation: Mutation,
        playlist: &PlaylistId,
        ids: &[TrackId],
    ) -> Result<usize, ReconcileError> {
        let mut applied = 0;

        for (batch, chunk) in ids.chunks(self.batch_size).enumerate() {
            debug!(
                "{} batch {} ({} tracks) on {}",
                operation,
                batch,
                chunk.len(),
                playlist
            );

            let result = match operation {
                Mutation::Remove => self.catalog.remove_tracks(playlist, chunk),
                Mutation::Add => self.catalog.add_tracks(playlist, chunk),
            };

            result.map_err(|source| ReconcileError::BatchFailed {
                operation,
                playlist: playlist.to_string(),
                batch,
                applied_batches: applied,
                source,
            })?;

            applied += 1;
        }

        Ok(applied)
    }
}
