use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::unit::WorkUnit;

/// Failure of the record extractor for one unit.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, timeout, HTTP 429 or 5xx. Eligible for retry.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Anything a retry will not fix (4xx, malformed listing).
    #[error("fetch failed: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let transient = e.is_timeout()
            || e.is_connect()
            || e.is_request()
            || e.is_body()
            || e
                .status()
                .map(|s| s.is_server_error() || s.as_u16() == 429)
                .unwrap_or(false);
        if transient {
            FetchError::Transient(e.to_string())
        } else {
            FetchError::Permanent(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("record already exists at {}", .0.display())]
    Collision(PathBuf),

    #[error("record {case_id} rejected: {reason}")]
    InvalidRecord { case_id: String, reason: String },

    #[error("storage failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// Storage-level failures escalate the whole run; the rest fail only the unit.
    pub fn is_persistence(&self) -> bool {
        matches!(self, WriteError::Io { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WriteError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress state at {} is corrupt ({reason}); run `reset --yes` to discard it", path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("progress store {} is locked by another run ({owner})", path.display())]
    Locked { path: PathBuf, owner: String },

    #[error("progress store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize progress state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that halt a run and propagate to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("persistence failure while processing {unit}: {source}")]
    Persistence {
        unit: WorkUnit,
        #[source]
        source: WriteError,
    },
}
