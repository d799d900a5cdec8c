//! Sync orchestrator for rebuilding the rotation playlist.
//!
//! One run walks a fixed sequence of phases and stops at the first error:
//!
//! 1. Resolve the target playlist by name, creating it when missing
//! 2. Drop and refetch the target's track list (the existing tracks)
//! 3. Drop and refetch the source user's playlist listing
//! 4. Summarize every listed playlist, invalidating drifted track lists
//! 5. Merge the tracks of every monthly playlist
//! 6. Remove tracks the target already has
//! 7. Sample the requested number of tracks
//! 8. Replace the target's tracks with the sample, unless dry-running
//!
//! # Example
//!
//! ```rust,ignore
//! use rand::SeedableRng;
//! use rotation_core::sync::{SyncOptions, SyncOrchestrator};
//!
//! let options = SyncOptions::new("me", "me").with_size(30).with_dry_run(true);
//! let cache = CatalogCache::new(&catalog, EntityCache::new(dir)?);
//! let rng = rand::rngs::StdRng::from_entropy();
//! let mut orchestrator = SyncOrchestrator::new(cache, rng, options);
//!
//! let report = orchestrator.run()?;
//! println!("{}", report.summary());
//! ```

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CatalogCache;
use crate::catalog::{Catalog, find_playlist_by_name};
use crate::error::{Error, Result};
use crate::model::{PlaylistId, TrackId};
use crate::playlist::Playlist;
use crate::reconcile::Reconciler;
use crate::summary::summarize_all;
use crate::track_set::TrackSet;
use crate::update::PlaylistUpdate;

/// Default target playlist name.
pub const DEFAULT_PLAYLIST_NAME: &str = "discovery monthly";

/// Default number of tracks to sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 30;

// =============================================================================
// Sync Phase Definitions
// =============================================================================

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Looking up or creating the target playlist.
    ResolvingTarget,
    /// Reading the target's current tracks.
    FetchingExisting,
    /// Reading the source user's playlists.
    FetchingPlaylists,
    /// Writing playlist summaries.
    Summarizing,
    /// Collecting tracks from monthly playlists.
    MergingMonthly,
    /// Removing tracks the target already has.
    ComputingCandidates,
    /// Picking tracks.
    Sampling,
    /// Updating the remote playlist.
    Reconciling,
    /// Run finished.
    Completed,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolvingTarget => write!(f, "Resolving target"),
            Self::FetchingExisting => write!(f, "Fetching existing tracks"),
            Self::FetchingPlaylists => write!(f, "Fetching playlists"),
            Self::Summarizing => write!(f, "Summarizing"),
            Self::MergingMonthly => write!(f, "Merging monthly playlists"),
            Self::ComputingCandidates => write!(f, "Computing candidates"),
            Self::Sampling => write!(f, "Sampling"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

// =============================================================================
// Sync Options
// =============================================================================

/// Parameters of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// User who owns the target playlist.
    pub self_user: String,
    /// User whose playlists are the sources.
    pub source_user: String,
    /// Target playlist name, matched ignoring case.
    pub playlist_name: String,
    /// Number of tracks to put in the target.
    pub size: usize,
    /// Compute the plan without touching the remote playlist.
    pub dry_run: bool,
}

impl SyncOptions {
    /// Options with the default name and size.
    pub fn new(self_user: impl Into<String>, source_user: impl Into<String>) -> Self {
        Self {
            self_user: self_user.into(),
            source_user: source_user.into(),
            playlist_name: DEFAULT_PLAYLIST_NAME.to_string(),
            size: DEFAULT_SAMPLE_SIZE,
            dry_run: false,
        }
    }

    /// Set the target playlist name.
    #[must_use]
    pub fn with_playlist_name(mut self, name: impl Into<String>) -> Self {
        self.playlist_name = name.into();
        self
    }

    /// Set the sample size.
    #[must_use]
    pub const fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reject options a run cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.self_user.trim().is_empty() {
            return Err(Error::configuration("self user is not set"));
        }
        if self.source_user.trim().is_empty() {
            return Err(Error::configuration("source user is not set"));
        }
        if self.playlist_name.trim().is_empty() {
            return Err(Error::configuration("target playlist name is empty"));
        }
        Ok(())
    }
}

// =============================================================================
// Sync Report
// =============================================================================

/// What a completed run found and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Target playlist ID.
    pub target_id: PlaylistId,
    /// Target playlist name as listed.
    pub target_name: String,
    /// Whether the target was created by this run.
    pub created: bool,
    /// Tracks in the target before the run.
    pub existing_count: usize,
    /// Monthly playlists merged.
    pub monthly_playlists: usize,
    /// Distinct tracks across monthly playlists.
    pub all_count: usize,
    /// Candidates not already in the target.
    pub sampling_count: usize,
    /// Sampled tracks, in enumeration order.
    pub selected: Vec<TrackId>,
    /// Playlists invalidated because their snapshot changed.
    pub invalidated: Vec<PlaylistId>,
    /// Tracks removed from the target.
    pub removed: usize,
    /// Tracks added to the target.
    pub added: usize,
    /// Whether the remote playlist was left untouched.
    pub dry_run: bool,
    /// Last phase reached.
    pub phase: SyncPhase,
    /// Wall-clock duration of the run.
    pub duration_secs: f64,
}

impl SyncReport {
    /// One-line description of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                concat!(
                    "Dry run for {} ({}): would remove {} and add {} of {} candidates ",
                    "from {} monthly playlists"
                ),
                self.target_name,
                self.target_id,
                self.existing_count,
                self.selected.len(),
                self.sampling_count,
                self.monthly_playlists
            )
        } else {
            format!(
                concat!(
                    "Synced {} ({}): removed {}, added {} of {} candidates ",
                    "from {} monthly playlists in {:.2}s"
                ),
                self.target_name,
                self.target_id,
                self.removed,
                self.added,
                self.sampling_count,
                self.monthly_playlists,
                self.duration_secs
            )
        }
    }
}

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Runs the rotation sync against one catalog and cache.
///
/// Everything a run touches (catalog, cache, random source, options) is
/// owned or borrowed here; nothing is global.
pub struct SyncOrchestrator<'a, C: Catalog + ?Sized, R: Rng> {
    cache: CatalogCache<'a, C>,
    rng: R,
    options: SyncOptions,
    phase: SyncPhase,
}

impl<'a, C: Catalog + ?Sized, R: Rng> SyncOrchestrator<'a, C, R> {
    /// Create an orchestrator.
    pub const fn new(cache: CatalogCache<'a, C>, rng: R, options: SyncOptions) -> Self {
        Self {
            cache,
            rng,
            options,
            phase: SyncPhase::ResolvingTarget,
        }
    }

    /// Phase the last run reached; after a failure, the phase that failed.
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// The options in use.
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// The cache, for inspection after a run.
    #[must_use]
    pub const fn cache(&self) -> &CatalogCache<'a, C> {
        &self.cache
    }

    fn enter(&mut self, phase: SyncPhase) {
        self.phase = phase;
    }

    /// Execute one run.
    pub fn run(&mut self) -> Result<SyncReport> {
        self.options.validate()?;
        let started = Instant::now();
        let catalog = self.cache.catalog();

        info!(
            "Getting playlists for {}, maintaining {:?} for {}",
            self.options.source_user, self.options.playlist_name, self.options.self_user
        );

        self.enter(SyncPhase::ResolvingTarget);
        let (target, created) = self.resolve_target()?;

        self.enter(SyncPhase::FetchingExisting);
        self.cache.invalidate_playlist(&target.id)?;
        let existing_tracks = self.cache.playlist_tracks(&target.id)?;
        let existing = TrackSet::from_playlist(&existing_tracks);
        info!(
            "Have {} {} ({} tracks)",
            target.id,
            target.name,
            existing_tracks.len()
        );

        self.enter(SyncPhase::FetchingPlaylists);
        let source_user = self.options.source_user.clone();
        self.cache.invalidate_user(&source_user)?;
        let playlists = self.cache.playlists(&source_user)?;

        self.enter(SyncPhase::Summarizing);
        let summarized = summarize_all(&mut self.cache, &playlists)?;

        self.enter(SyncPhase::MergingMonthly);
        let monthly = playlists.monthly();
        let mut all = TrackSet::new();
        for playlist in &monthly {
            let tracks = self.cache.playlist_tracks(&playlist.id)?;
            info!("Monthly: {} ({} tracks)", playlist.name, tracks.len());
            all.merge(&tracks);
        }
        info!("Total tracks: {}", all.len());

        self.enter(SyncPhase::ComputingCandidates);
        let sampling = all.difference(&existing);
        info!("Sampling tracks: {}", sampling.len());

        self.enter(SyncPhase::Sampling);
        let selected = sampling.sample(self.options.size, &mut self.rng)?;

        let mut update = PlaylistUpdate::new(existing.clone());
        for id in selected.iter() {
            update.add_track(id.clone());
        }

        let (removed, added) = if self.options.dry_run {
            info!(
                "Dry run! Would remove {} and add {} tracks",
                update.ids_to_remove().len(),
                update.ids_to_add().len()
            );
            (0, 0)
        } else {
            self.enter(SyncPhase::Reconciling);
            let outcome = Reconciler::new(catalog).apply(&target.id, &update)?;
            (outcome.removed, outcome.added)
        };

        self.enter(SyncPhase::Completed);

        Ok(SyncReport {
            target_id: target.id,
            target_name: target.name,
            created,
            existing_count: existing.len(),
            monthly_playlists: monthly.len(),
            all_count: all.len(),
            sampling_count: sampling.len(),
            selected: selected.to_ordered(),
            invalidated: summarized.invalidated,
            removed,
            added,
            dry_run: self.options.dry_run,
            phase: self.phase,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Find the target playlist, creating it (public) when it does not exist.
    fn resolve_target(&self) -> Result<(Playlist, bool)> {
        let catalog = self.cache.catalog();
        let user = &self.options.self_user;
        let name = &self.options.playlist_name;

        if let Some(found) = find_playlist_by_name(catalog, user, name)? {
            return Ok((found, false));
        }

        let created = catalog.create_playlist(user, name, true)?;
        info!("Created destination {} ({})", name, created);

        match find_playlist_by_name(catalog, user, name)? {
            Some(found) => Ok((found, true)),
            None => {
                warn!(
                    "Created playlist {} is not listed yet, using the returned ID",
                    created
                );
                Ok((
                    Playlist {
                        id: created,
                        user: user.clone(),
                        owner: user.clone(),
                        name: name.clone(),
                        images: Vec::new(),
                        snapshot_id: String::new(),
                    },
                    true,
                ))
            }
        }
    }
}
