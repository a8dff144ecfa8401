//! # scribe-stream
//!
//! Stream reconciliation engine for scribe.
//!
//! A remote generation process emits a stream of loosely shaped frames. The
//! engine folds them, one at a time, into two pieces of owned state:
//! - a versioned [`Artifact`](scribe_types::Artifact) (text or code
//!   snapshots, one new version per fold)
//! - the conversation's [`Message`](scribe_types::Message) list
//!
//! Along the way it repairs truncated JSON, splices streamed replacements
//! into highlighted spans, upgrades legacy stored shapes, and re-attaches
//! shared-run annotations when a persisted conversation is loaded.

pub mod config;
pub mod error;
pub mod fold;
pub mod frame;
pub mod messages;
pub mod migrate;
pub mod notify;
pub mod partial_json;
pub mod patch;
pub mod reconcile;
pub mod session;
pub mod share;
pub mod source;

pub use config::{ConfigError, EngineConfig};
pub use error::{FrameError, MigrationError, Result, SessionError, TransportError};
pub use fold::{Fold, FoldRequest, FoldSummary, RewriteMeta, SessionUpdate};
pub use frame::{Frame, FrameEvent, MessageChunk, Origin, Phase, RawFrame};
pub use messages::{ChunkMode, fold_message_chunk};
pub use migrate::{StoredArtifact, migrate, migrate_value};
pub use notify::{LogNotifier, Notice, Notifier};
pub use partial_json::{JsonAccumulator, parse_partial};
pub use patch::{EditCursor, SpanLocator, strip_code_fence};
pub use reconcile::{PersistedBundle, Reconciled, reconcile};
pub use session::{FoldOutcome, FoldPhase, Session, SessionSnapshot, Termination};
pub use share::{RunSharer, attach_shared_run, shared_run_id};
pub use source::{FrameSource, ReplaySource, StreamSource};
