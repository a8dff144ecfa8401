//! Upgrading stored artifacts from deprecated shapes.
//!
//! Three shapes exist in storage, told apart by key presence:
//!
//! | shape             | keys                                   |
//! |-------------------|----------------------------------------|
//! | current           | `currentIndex` + `contents`            |
//! | legacy, versioned | `currentContentIndex` + `contents`     |
//! | legacy, single    | neither (`type`, `title`, `content`..) |

use scribe_types::{Artifact, ContentSnapshot, ProgrammingLanguage, SnapshotKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::MigrationError;

/// One version in a deprecated shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyContent {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    #[serde(default, alias = "fullMarkdown", alias = "code")]
    pub content: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl LegacyContent {
    fn into_snapshot(self, fallback_index: u32) -> ContentSnapshot {
        let index = self.index.unwrap_or(fallback_index);
        match self.kind {
            SnapshotKind::Text => ContentSnapshot::text(index, self.title, self.content),
            SnapshotKind::Code => {
                let language = self
                    .language
                    .as_deref()
                    .and_then(ProgrammingLanguage::from_name)
                    .unwrap_or_default();
                ContentSnapshot::code(index, self.title, language, self.content)
            }
        }
    }
}

/// The older multi-version shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyVersioned {
    pub current_content_index: u32,
    #[serde(default)]
    pub contents: Vec<LegacyContent>,
}

/// An artifact as found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredArtifact {
    Current(Artifact),
    Versioned(LegacyVersioned),
    Single(LegacyContent),
}

impl StoredArtifact {
    /// Detect the shape of a stored JSON value.
    pub fn from_value(value: Value) -> Result<Self, MigrationError> {
        let Some(obj) = value.as_object() else {
            return Err(MigrationError::NotAnObject);
        };
        if obj.contains_key("currentIndex") && obj.contains_key("contents") {
            Ok(Self::Current(serde_json::from_value(value)?))
        } else if obj.contains_key("currentContentIndex") {
            Ok(Self::Versioned(serde_json::from_value(value)?))
        } else {
            Ok(Self::Single(serde_json::from_value(value)?))
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, Self::Current(_))
    }
}

impl From<Artifact> for StoredArtifact {
    fn from(artifact: Artifact) -> Self {
        Self::Current(artifact)
    }
}

/// Bring a stored artifact into the current shape. A no-op for current ones.
pub fn migrate(stored: StoredArtifact) -> Artifact {
    match stored {
        StoredArtifact::Current(artifact) => artifact,
        StoredArtifact::Single(content) => Artifact::single(content.into_snapshot(1)),
        StoredArtifact::Versioned(legacy) => {
            let contents: Vec<ContentSnapshot> = legacy
                .contents
                .into_iter()
                .zip(1u32..)
                .map(|(content, position)| content.into_snapshot(position))
                .collect();
            // Point at a stored version; a dangling pointer falls back to the newest.
            let current_index = if contents.iter().any(|c| c.index() == legacy.current_content_index) {
                legacy.current_content_index
            } else {
                contents.iter().map(ContentSnapshot::index).max().unwrap_or_default()
            };
            Artifact {
                current_index,
                contents,
            }
        }
    }
}

/// Detect and migrate in one step.
pub fn migrate_value(value: Value) -> Result<Artifact, MigrationError> {
    Ok(migrate(StoredArtifact::from_value(value)?))
}
