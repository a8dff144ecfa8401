//! Stream frames: the raw transport shape and its typed classification.
//!
//! The transport hands over loosely shaped JSON. Everything is optional on
//! [`RawFrame`]; [`Frame::classify`] validates once at the boundary and
//! produces a typed [`Frame`] keyed by `(Origin, FrameEvent)`, so handlers
//! never re-check optional fields.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::EnumString;

use crate::error::FrameError;

/// Lifecycle-end frame name carrying rewrite metadata.
pub const REWRITE_META_NAME: &str = "optionallyUpdateArtifactMeta";

/// Frame name of the model call producing rewritten content.
pub const REWRITE_MODEL_CALL_NAME: &str = "rewrite_artifact_model_call";

/// One frame exactly as the transport delivers it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Origin + phase discriminator, e.g. `on_chat_model_stream`.
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: FrameMetadata,
    #[serde(default)]
    pub data: FrameData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub langgraph_node: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// `[ignored, payload]`, or the payload itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<Value>,
}

impl RawFrame {
    /// Convenience constructor used by replays and tests.
    pub fn new(event: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            metadata: FrameMetadata {
                run_id: None,
                langgraph_node: node.into(),
            },
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.metadata.run_id = Some(run_id.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.data.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.data.output = Some(output);
        self
    }

    /// Attach a payload in the `[ignored, payload]` form.
    pub fn with_chunk(mut self, payload: Value) -> Self {
        self.data.chunk = Some(Value::Array(vec![Value::Null, payload]));
        self
    }

    /// Run id, ignoring empty strings.
    pub fn run_id(&self) -> Option<&str> {
        self.metadata.run_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Logical stage of the remote process that emitted a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString)]
pub enum Origin {
    #[strum(serialize = "generateFollowup")]
    GenerateFollowup,
    #[strum(serialize = "replyToGeneralInput")]
    ReplyToGeneralInput,
    #[strum(serialize = "generateArtifact")]
    GenerateArtifact,
    #[strum(serialize = "updateHighlightedText")]
    UpdateHighlightedText,
    #[strum(serialize = "updateArtifact")]
    UpdateArtifact,
    #[strum(serialize = "rewriteArtifact")]
    RewriteArtifact,
    #[strum(serialize = "rewriteArtifactTheme")]
    RewriteArtifactTheme,
    #[strum(serialize = "rewriteCodeArtifactTheme")]
    RewriteCodeArtifactTheme,
    #[strum(serialize = "customAction")]
    CustomAction,
}

impl Origin {
    /// Parse a graph node name. Unknown nodes are not routed.
    pub fn from_node(node: &str) -> Option<Self> {
        Self::from_str(node).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::GenerateFollowup => "generateFollowup",
            Origin::ReplyToGeneralInput => "replyToGeneralInput",
            Origin::GenerateArtifact => "generateArtifact",
            Origin::UpdateHighlightedText => "updateHighlightedText",
            Origin::UpdateArtifact => "updateArtifact",
            Origin::RewriteArtifact => "rewriteArtifact",
            Origin::RewriteArtifactTheme => "rewriteArtifactTheme",
            Origin::RewriteCodeArtifactTheme => "rewriteCodeArtifactTheme",
            Origin::CustomAction => "customAction",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase, from the event suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    Delta,
    End,
    Other,
}

impl Phase {
    pub fn of(event: &str) -> Self {
        if event.ends_with("_start") {
            Phase::Start
        } else if event.ends_with("_stream") {
            Phase::Delta
        } else if event.ends_with("_end") {
            Phase::End
        } else {
            Phase::Other
        }
    }
}

/// One streamed tool-call fragment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Payload of a delta frame: one chunk of a model message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

impl MessageChunk {
    /// Text content of the chunk (string or text parts).
    pub fn text(&self) -> String {
        scribe_types::flatten_content(&self.content)
    }

    /// Argument fragment of the first tool-call chunk, if any.
    pub fn tool_args(&self) -> Option<&str> {
        self.tool_call_chunks
            .first()
            .and_then(|c| c.args.as_deref())
            .filter(|args| !args.is_empty())
    }

    fn from_payload(payload: &Value) -> Result<Self, FrameError> {
        // Serialized LangChain objects nest the fields under `kwargs`.
        let fields = payload.get("kwargs").unwrap_or(payload);
        MessageChunk::deserialize(fields).map_err(|e| FrameError::malformed(format!("bad chunk: {e}")))
    }
}

/// What a frame carries, by phase.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Start { input: Value },
    Delta { chunk: MessageChunk },
    End { output: Value },
    Other,
}

/// A classified frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub run_id: Option<String>,
    /// `None` for graph nodes the router does not know.
    pub origin: Option<Origin>,
    pub name: Option<String>,
    pub event: FrameEvent,
}

impl Frame {
    /// Validate a raw frame once and type it.
    ///
    /// Fails only for delta frames whose payload is missing or unreadable.
    pub fn classify(raw: RawFrame) -> Result<Self, FrameError> {
        let run_id = raw.run_id().map(str::to_string);
        let origin = Origin::from_node(&raw.metadata.langgraph_node);
        let event = match Phase::of(&raw.event) {
            Phase::Start => FrameEvent::Start {
                input: raw.data.input.unwrap_or(Value::Null),
            },
            Phase::End => FrameEvent::End {
                output: raw.data.output.unwrap_or(Value::Null),
            },
            Phase::Delta => {
                let payload = match &raw.data.chunk {
                    Some(Value::Array(pair)) => pair.get(1),
                    Some(obj @ Value::Object(_)) => Some(obj),
                    _ => None,
                };
                let payload = payload
                    .filter(|p| p.is_object())
                    .ok_or_else(|| FrameError::malformed("delta frame without a chunk payload"))?;
                FrameEvent::Delta {
                    chunk: MessageChunk::from_payload(payload)?,
                }
            }
            Phase::Other => FrameEvent::Other,
        };

        Ok(Self {
            run_id,
            origin,
            name: raw.name,
            event,
        })
    }
}
