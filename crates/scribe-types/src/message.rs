//! Chat messages folded alongside the artifact.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Role {
    #[serde(alias = "human")]
    #[strum(serialize = "user", serialize = "human")]
    User,
    #[default]
    #[serde(alias = "ai")]
    #[strum(serialize = "assistant", serialize = "ai")]
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Parse from string (case-insensitive); accepts `human` and `ai`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A structured annotation attached to a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Provider metadata carried on a message.
///
/// Only the shared-run reference is interpreted; everything else is kept
/// verbatim so it survives a load/save cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(
        rename = "langSmithRunURL",
        alias = "sharedRunUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub shared_run_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One chat message. Identity is `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default, alias = "type")]
    pub role: Role,
    #[serde(default, deserialize_with = "content_text")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<ResponseMetadata>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            response_metadata: None,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content)
    }

    /// Check whether an annotation with this name is already attached.
    pub fn has_tool_call(&self, name: &str) -> bool {
        self.tool_calls.iter().any(|tc| tc.name == name)
    }

    /// The shared-run URL recorded in response metadata, if any.
    pub fn shared_run_url(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.shared_run_url.as_deref())
    }
}

/// Flatten message content to text.
///
/// Providers send either a plain string or an array of content parts
/// (`{"type": "text", "text": ...}`); non-text parts are dropped.
pub fn flatten_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

fn content_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flatten_content(&value))
}
