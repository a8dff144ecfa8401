//! Highlight descriptors: which part of the previous snapshot an edit replaces.

use serde::{Deserialize, Serialize};

/// A character range in a code snapshot, `start_char_index..end_char_index`.
///
/// Offsets count Unicode scalar values, not bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRange {
    pub start_char_index: usize,
    pub end_char_index: usize,
}

impl CodeRange {
    pub fn new(start_char_index: usize, end_char_index: usize) -> Self {
        Self {
            start_char_index,
            end_char_index,
        }
    }
}

/// A highlighted block of a markdown snapshot.
///
/// `markdown_block` is located inside `full_markdown` by its first occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextHighlight {
    pub full_markdown: String,
    pub markdown_block: String,
    /// Plain-text selection the user made; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
}

impl TextHighlight {
    pub fn new(full_markdown: impl Into<String>, markdown_block: impl Into<String>) -> Self {
        Self {
            full_markdown: full_markdown.into(),
            markdown_block: markdown_block.into(),
            selected_text: None,
        }
    }
}
