//! Error types for the reconciliation engine.
//!
//! Frame-level failures never cross the fold boundary: each [`FrameError`]
//! knows whether it is worth telling the user about and whether it should
//! stop further frames from the same origin. Only [`SessionError`] is ever
//! returned to a caller.

use scribe_types::SnapshotKind;
use thiserror::Error;

/// Why a single frame was not applied.
#[derive(Debug, Clone, Error, PartialEq, Eq, Hash)]
pub enum FrameError {
    /// An edit arrived but there is no artifact to edit.
    #[error("no artifact to update")]
    NoArtifact,

    /// A highlighted-text edit arrived before its highlight was captured.
    #[error("no highlighted text captured for this edit")]
    NoHighlight,

    /// A ranged code edit arrived but the request carries no range.
    #[error("no highlighted code range in the request")]
    NoCodeRange,

    /// The artifact has no snapshot at its current index.
    #[error("artifact has no snapshot at index {0}")]
    NoActiveSnapshot(u32),

    /// The active snapshot is the wrong variant for this edit.
    #[error("expected a {expected} snapshot, found {found}")]
    WrongVariant {
        expected: SnapshotKind,
        found: SnapshotKind,
    },

    /// A code artifact was declared without a language.
    #[error("code artifact declared without a language")]
    MissingLanguage,

    /// The highlighted block does not occur in the document.
    #[error("highlighted block not found in document")]
    BlockNotFound,

    /// The highlighted range falls outside the document.
    #[error("range {start}..{end} out of bounds for document with {len} characters")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    /// The frame is missing fields or carries unparseable data.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl FrameError {
    /// Create a Malformed error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    /// Precondition failures are surfaced to the user; malformed frames are
    /// expected streaming noise and only logged.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }

    /// Whether every later frame from the same origin should be dropped.
    ///
    /// A missing document or highlight cannot appear mid-fold, and a block or
    /// range that failed to locate once will fail identically on every frame.
    pub fn aborts_origin(&self) -> bool {
        matches!(
            self,
            Self::NoArtifact
                | Self::NoHighlight
                | Self::NoCodeRange
                | Self::BlockNotFound
                | Self::RangeOutOfBounds { .. }
        )
    }
}

/// Failure reported by a frame source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport failed: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// A stored artifact that could not be migrated.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("stored artifact is not a JSON object")]
    NotAnObject,

    #[error("unrecognised artifact shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Errors returned by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A fold is already in flight on this session.
    #[error("a fold is already running on this session")]
    AlreadyFolding,

    /// The persisted bundle carried an artifact that could not be migrated.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
