//! Programming languages a code snapshot can declare.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Language of a code snapshot.
///
/// The set is closed; anything unrecognised resolves to [`Other`](Self::Other),
/// the generic fallback. Which members a deployment actually offers is a
/// configuration concern (see the engine's `EngineConfig`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProgrammingLanguage {
    #[strum(serialize = "typescript", serialize = "ts", serialize = "tsx")]
    Typescript,
    #[strum(serialize = "javascript", serialize = "js", serialize = "jsx")]
    Javascript,
    #[strum(serialize = "cpp", serialize = "c++")]
    Cpp,
    Java,
    Php,
    #[strum(serialize = "python", serialize = "py")]
    Python,
    Html,
    Sql,
    Json,
    #[strum(serialize = "rust", serialize = "rs")]
    Rust,
    Xml,
    #[strum(serialize = "clojure", serialize = "clj")]
    Clojure,
    #[strum(serialize = "csharp", serialize = "c#", serialize = "cs")]
    Csharp,
    #[default]
    Other,
}

impl ProgrammingLanguage {
    /// Every known language, fallback last.
    pub const ALL: [ProgrammingLanguage; 14] = [
        Self::Typescript,
        Self::Javascript,
        Self::Cpp,
        Self::Java,
        Self::Php,
        Self::Python,
        Self::Html,
        Self::Sql,
        Self::Json,
        Self::Rust,
        Self::Xml,
        Self::Clojure,
        Self::Csharp,
        Self::Other,
    ];

    /// Parse a language name or common alias (case-insensitive).
    ///
    /// Returns `None` for names outside the closed set; callers decide the
    /// fallback.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name.trim()).ok()
    }

    /// Canonical lowercase name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Javascript => "javascript",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Php => "php",
            Self::Python => "python",
            Self::Html => "html",
            Self::Sql => "sql",
            Self::Json => "json",
            Self::Rust => "rust",
            Self::Xml => "xml",
            Self::Clojure => "clojure",
            Self::Csharp => "csharp",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ProgrammingLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
