//! The versioned artifact and its content snapshots.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ProgrammingLanguage;

/// Which variant a snapshot is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SnapshotKind {
    #[strum(serialize = "text", serialize = "markdown")]
    Text,
    Code,
}

impl SnapshotKind {
    /// Parse from string (case-insensitive). `"markdown"` is accepted for text.
    pub fn from_name(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s.trim()).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Text => "text",
            SnapshotKind::Code => "code",
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markdown content of one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSnapshot {
    pub index: u32,
    #[serde(default)]
    pub title: String,
    pub full_markdown: String,
}

/// Source code content of one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnapshot {
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: ProgrammingLanguage,
    pub code: String,
}

/// One immutable version of the artifact, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentSnapshot {
    Text(TextSnapshot),
    Code(CodeSnapshot),
}

impl ContentSnapshot {
    /// Create a text snapshot.
    pub fn text(index: u32, title: impl Into<String>, full_markdown: impl Into<String>) -> Self {
        Self::Text(TextSnapshot {
            index,
            title: title.into(),
            full_markdown: full_markdown.into(),
        })
    }

    /// Create a code snapshot.
    pub fn code(
        index: u32,
        title: impl Into<String>,
        language: ProgrammingLanguage,
        code: impl Into<String>,
    ) -> Self {
        Self::Code(CodeSnapshot {
            index,
            title: title.into(),
            language,
            code: code.into(),
        })
    }

    pub fn index(&self) -> u32 {
        match self {
            Self::Text(t) => t.index,
            Self::Code(c) => c.index,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Text(t) => &t.title,
            Self::Code(c) => &c.title,
        }
    }

    pub fn kind(&self) -> SnapshotKind {
        match self {
            Self::Text(_) => SnapshotKind::Text,
            Self::Code(_) => SnapshotKind::Code,
        }
    }

    /// The snapshot's body: markdown for text, source for code.
    pub fn body(&self) -> &str {
        match self {
            Self::Text(t) => &t.full_markdown,
            Self::Code(c) => &c.code,
        }
    }

    /// Declared language, for code snapshots only.
    pub fn language(&self) -> Option<ProgrammingLanguage> {
        match self {
            Self::Text(_) => None,
            Self::Code(c) => Some(c.language),
        }
    }

    pub fn as_text(&self) -> Option<&TextSnapshot> {
        match self {
            Self::Text(t) => Some(t),
            Self::Code(_) => None,
        }
    }

    pub fn as_code(&self) -> Option<&CodeSnapshot> {
        match self {
            Self::Code(c) => Some(c),
            Self::Text(_) => None,
        }
    }

    /// Same content, re-homed at another index.
    pub fn with_index(mut self, index: u32) -> Self {
        match &mut self {
            Self::Text(t) => t.index = index,
            Self::Code(c) => c.index = index,
        }
        self
    }
}

/// The versioned document.
///
/// `current_index` names the `index` of some element of `contents` whenever
/// `contents` is non-empty. Collaborators keep that true; this type does not
/// re-validate it on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub current_index: u32,
    pub contents: Vec<ContentSnapshot>,
}

impl Artifact {
    /// A fresh artifact holding exactly one snapshot at index 1.
    pub fn single(snapshot: ContentSnapshot) -> Self {
        Self {
            current_index: 1,
            contents: vec![snapshot.with_index(1)],
        }
    }

    /// The snapshot `current_index` points at.
    pub fn current(&self) -> Option<&ContentSnapshot> {
        self.get(self.current_index)
    }

    /// Look up a snapshot by its `index` (not its position).
    pub fn get(&self, index: u32) -> Option<&ContentSnapshot> {
        self.contents.iter().find(|c| c.index() == index)
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Index a new version appended now would get: `len + 1`.
    pub fn next_index(&self) -> u32 {
        self.contents.len() as u32 + 1
    }

    /// Copy-on-write snapshot update.
    ///
    /// Returns a new artifact where the snapshot sharing `snapshot.index()` is
    /// replaced (or, if none exists yet, `snapshot` is appended) and
    /// `current_index` points at it. Writing the same index repeatedly never
    /// grows the history past one entry for that index.
    pub fn with_snapshot_at(&self, snapshot: ContentSnapshot) -> Self {
        let index = snapshot.index();
        let mut contents = self.contents.clone();
        match contents.iter().position(|c| c.index() == index) {
            Some(pos) => contents[pos] = snapshot,
            None => contents.push(snapshot),
        }
        Self {
            current_index: index,
            contents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_versions() -> Artifact {
        Artifact {
            current_index: 2,
            contents: vec![
                ContentSnapshot::text(1, "Notes", "# v1"),
                ContentSnapshot::text(2, "Notes", "# v2"),
            ],
        }
    }

    #[test]
    fn test_single_reindexes_to_one() {
        let artifact = Artifact::single(ContentSnapshot::text(7, "t", "body"));
        assert_eq!(artifact.current_index, 1);
        assert_eq!(artifact.contents[0].index(), 1);
        assert_eq!(artifact.current().map(|c| c.body()), Some("body"));
    }

    #[test]
    fn test_with_snapshot_at_appends_then_replaces() {
        let base = two_versions();
        let idx = base.next_index();
        assert_eq!(idx, 3);

        let first = base.with_snapshot_at(ContentSnapshot::text(idx, "Notes", "# v3 draft"));
        assert_eq!(first.len(), 3);
        assert_eq!(first.current_index, 3);

        let second = first.with_snapshot_at(ContentSnapshot::text(idx, "Notes", "# v3 final"));
        assert_eq!(second.len(), 3);
        assert_eq!(second.current().map(|c| c.body()), Some("# v3 final"));

        // The source artifact is untouched.
        assert_eq!(base.len(), 2);
        assert_eq!(base.current_index, 2);
    }

    #[test]
    fn test_get_uses_index_not_position() {
        let artifact = Artifact {
            current_index: 5,
            contents: vec![ContentSnapshot::code(5, "main", ProgrammingLanguage::Rust, "fn main() {}")],
        };
        assert!(artifact.get(1).is_none());
        assert_eq!(artifact.current().and_then(|c| c.language()), Some(ProgrammingLanguage::Rust));
    }

    #[test]
    fn test_serde_shape_is_camel_case_and_tagged() {
        let artifact = Artifact {
            current_index: 1,
            contents: vec![ContentSnapshot::code(1, "add", ProgrammingLanguage::Javascript, "a+b")],
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "currentIndex": 1,
                "contents": [{
                    "type": "code",
                    "index": 1,
                    "title": "add",
                    "language": "javascript",
                    "code": "a+b"
                }]
            })
        );

        let text: ContentSnapshot =
            serde_json::from_value(serde_json::json!({"type": "text", "index": 2, "title": "", "fullMarkdown": "hi"}))
                .unwrap();
        assert_eq!(text.kind(), SnapshotKind::Text);
        assert_eq!(text.body(), "hi");
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(SnapshotKind::from_name("CODE"), Some(SnapshotKind::Code));
        assert_eq!(SnapshotKind::from_name("markdown"), Some(SnapshotKind::Text));
        assert_eq!(SnapshotKind::from_name("co"), None);
    }
}
