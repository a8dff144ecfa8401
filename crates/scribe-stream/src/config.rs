//! Engine configuration.
//!
//! Loaded from RON; every field has a default so a partial file (or none at
//! all) is valid.
//!
//! ```ron
//! (
//!     message_chunks: cumulative,
//!     fallback_language: other,
//!     supported_languages: Some([typescript, javascript, python, rust]),
//!     update_capacity: 256,
//! )
//! ```

use std::path::Path;

use scribe_types::ProgrammingLanguage;
use serde::{Deserialize, Serialize};

use crate::messages::ChunkMode;

/// Default broadcast capacity for session updates.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Tool-call name of the synthesized shared-run annotation.
pub const DEFAULT_SHARE_ANNOTATION: &str = "langsmith_tool_ui";

/// Path segment that precedes the run identifier in a shared-run URL.
pub const DEFAULT_SHARE_URL_MARKER: &str = "public";

/// Tunables for folding and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether chat chunks carry the whole message so far or just a suffix.
    pub message_chunks: ChunkMode,

    /// Language used when nothing better resolves.
    pub fallback_language: ProgrammingLanguage,

    /// Languages this deployment offers. `None` means every known language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_languages: Option<Vec<ProgrammingLanguage>>,

    /// Capacity of the session update broadcast channel.
    pub update_capacity: usize,

    /// Name given to the shared-run annotation on messages.
    pub share_annotation: String,

    /// URL path segment preceding the run identifier.
    pub share_url_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            message_chunks: ChunkMode::default(),
            fallback_language: ProgrammingLanguage::Other,
            supported_languages: None,
            update_capacity: DEFAULT_UPDATE_CAPACITY,
            share_annotation: DEFAULT_SHARE_ANNOTATION.to_string(),
            share_url_marker: DEFAULT_SHARE_URL_MARKER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a RON document.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Whether `language` is offered by this deployment.
    pub fn supports(&self, language: ProgrammingLanguage) -> bool {
        match &self.supported_languages {
            None => true,
            Some(set) => language == ProgrammingLanguage::Other || set.contains(&language),
        }
    }

    /// Map a language name onto the supported set.
    ///
    /// Unknown names and languages outside `supported_languages` resolve to
    /// `fallback_language`.
    pub fn resolve_language(&self, name: &str) -> ProgrammingLanguage {
        ProgrammingLanguage::from_name(name)
            .filter(|lang| self.supports(*lang))
            .unwrap_or(self.fallback_language)
    }

    /// Pass a known language through the supported set.
    pub fn constrain(&self, language: ProgrammingLanguage) -> ProgrammingLanguage {
        if self.supports(language) {
            language
        } else {
            self.fallback_language
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
