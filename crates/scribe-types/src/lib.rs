//! Shared document and message types for scribe.
//!
//! The artifact is an append-only version history: every snapshot carries a
//! unique, monotonically increasing `index`, and `currentIndex` is a movable
//! read pointer into that history. Snapshots are never edited in place; an
//! update produces a new [`Artifact`] value with the snapshot at one index
//! replaced or appended.
//!
//! Serde shapes follow the persisted camelCase format (`currentIndex`,
//! `fullMarkdown`, `startCharIndex`, ...), so values round-trip through the
//! storage collaborator unchanged.

mod artifact;
mod highlight;
mod language;
mod message;

pub use artifact::{Artifact, CodeSnapshot, ContentSnapshot, SnapshotKind, TextSnapshot};
pub use highlight::{CodeRange, TextHighlight};
pub use language::ProgrammingLanguage;
pub use message::{Message, ResponseMetadata, Role, ToolCall, flatten_content};
