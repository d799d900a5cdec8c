//! Error types for Rotation core operations.
//!
//! Every failure in a sync run is fatal for that run. The typed sub-errors
//! exist so callers (and tests) can tell the categories apart, see
//! [`Error::kind`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by [`crate::catalog::Catalog`] implementations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur in Rotation core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote catalog failed or refused a request.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A cache file could not be read, written or decoded.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Sampling precondition was violated.
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// A playlist could not be summarized.
    #[error(transparent)]
    Summary(#[from] SummaryError),

    /// A batched playlist mutation failed part way through.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A query against cached data was rejected.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport or authorization failure talking to the catalog.
    Transport,
    /// Malformed cache file, summaries file or timestamp.
    Serialization,
    /// Asked for more than the data can provide, or asked nonsensically.
    Precondition,
    /// Remote playlist left partially updated.
    Reconciliation,
    /// Bad or missing configuration.
    Configuration,
    /// Local file system failure.
    Io,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Catalog(_) => ErrorKind::Transport,
            Self::Cache(CacheError::Corrupt { .. }) | Self::Summary(_) | Self::Serialization(_) => {
                ErrorKind::Serialization
            }
            Self::Cache(_) | Self::Io(_) => ErrorKind::Io,
            Self::Sampling(_) | Self::InvalidQuery(_) => ErrorKind::Precondition,
            Self::Reconcile(_) => ErrorKind::Reconciliation,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Errors returned by the remote catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The request never produced a response.
    #[error("Catalog request failed: {0}")]
    Transport(String),

    /// The catalog rejected our credentials.
    #[error("Catalog refused access ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Any other non-success response.
    #[error("Catalog returned {status} for {endpoint}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Endpoint path that failed.
        endpoint: String,
        /// Response body or reason.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Malformed catalog response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint path that returned the body.
        endpoint: String,
        /// Decoder message.
        reason: String,
    },
}

/// Errors from the on-disk entity cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache file exists but does not decode.
    #[error("Corrupt cache file {path}: {reason}")]
    Corrupt {
        /// Cache file path.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// A cache file could not be read.
    #[error("Failed to read cache file {path}: {reason}")]
    ReadFailed {
        /// Cache file path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A cache file could not be written.
    #[error("Failed to write cache file {path}: {reason}")]
    WriteFailed {
        /// Cache file path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A cache file could not be removed.
    #[error("Failed to remove cache file {path}: {reason}")]
    RemoveFailed {
        /// Cache file path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The cache directory could not be created.
    #[error("Failed to create cache directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// Errors from track sampling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplingError {
    /// Fewer candidates than requested.
    #[error("Not enough tracks to sample from: requested {requested}, available {available}")]
    InsufficientPopulation {
        /// Number of tracks asked for.
        requested: usize,
        /// Number of tracks in the set.
        available: usize,
    },
}

/// Errors from playlist summarization.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A track's added-at timestamp is not in the catalog's fixed format.
    #[error("Invalid added-at timestamp {value:?} in playlist {playlist}: {reason}")]
    InvalidTimestamp {
        /// Playlist being summarized.
        playlist: String,
        /// The offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Kind of batched playlist mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Removing tracks.
    Remove,
    /// Adding tracks.
    Add,
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Add => write!(f, "add"),
        }
    }
}

/// Errors from reconciling the target playlist.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// One batch failed; earlier batches remain applied.
    #[error(
        "Failed to {operation} tracks on playlist {playlist} ({done} batches applied): {source}",
        done = .applied_batches
    )]
    BatchFailed {
        /// Which mutation was running.
        operation: Mutation,
        /// Target playlist ID.
        playlist: String,
        /// Zero-based index of the failing batch.
        batch: usize,
        /// Number of batches that succeeded before the failure.
        applied_batches: usize,
        /// The catalog failure.
        #[source]
        source: CatalogError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_error_display() {
        let err = SamplingError::InsufficientPopulation {
            requested: 30,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "Not enough tracks to sample from: requested 30, available 4"
        );
    }

    #[test]
    fn test_error_kinds() {
        let corrupt: Error = CacheError::Corrupt {
            path: PathBuf::from("/cache/playlist-x.json"),
            reason: "EOF".to_string(),
        }
        .into();
        assert_eq!(corrupt.kind(), ErrorKind::Serialization);

        let unwritable: Error = CacheError::WriteFailed {
            path: PathBuf::from("/cache/playlist-x.json"),
            reason: "read-only".to_string(),
        }
        .into();
        assert_eq!(unwritable.kind(), ErrorKind::Io);

        let transport: Error = CatalogError::Transport("timeout".to_string()).into();
        assert_eq!(transport.kind(), ErrorKind::Transport);

        let sampling: Error = SamplingError::InsufficientPopulation {
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(sampling.kind(), ErrorKind::Precondition);

        assert_eq!(
            Error::configuration("missing user").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_batch_failed_display() {
        let err = ReconcileError::BatchFailed {
            operation: Mutation::Add,
            playlist: "p1".to_string(),
            batch: 2,
            applied_batches: 2,
            source: CatalogError::Transport("reset".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("add tracks on playlist p1"));
        assert!(message.contains("(2 batches applied)"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
