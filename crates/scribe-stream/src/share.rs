//! Run-sharing side channel.
//!
//! After a fold the session asks a [`RunSharer`] for a public URL of the run
//! and attaches it to the followup message as a structured annotation. The
//! same annotation is re-synthesized on session switch for messages that only
//! kept the URL in their metadata.

use async_trait::async_trait;
use scribe_types::{Message, ResponseMetadata, ToolCall};
use serde_json::json;
use url::Url;

use crate::config::EngineConfig;

/// Produces shareable URLs for finished runs.
#[async_trait]
pub trait RunSharer: Send + Sync {
    /// Share `run_id`, returning its public URL, or `None` if unavailable.
    async fn share_run(&self, run_id: &str) -> Option<String>;
}

/// Extract the run identifier from a shared-run URL.
///
/// Takes the path segment after `marker` (`.../public/<id>/r` gives `<id>`);
/// without the marker, the last non-empty segment. Query and fragment are
/// ignored. Returns `None` for anything that is not an absolute URL.
pub fn shared_run_id(url: &str, marker: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let after_marker = segments
        .iter()
        .position(|s| *s == marker)
        .and_then(|pos| segments.get(pos + 1));
    after_marker
        .or_else(|| segments.last())
        .map(|s| s.to_string())
}

/// The annotation describing a shared run.
pub fn share_annotation(url: &str, config: &EngineConfig) -> ToolCall {
    ToolCall {
        name: config.share_annotation.clone(),
        args: json!({ "sharedRunURL": url }),
        id: shared_run_id(url, &config.share_url_marker),
    }
}

/// Attach a shared-run annotation to a message, once.
///
/// Returns `false` when the message already carries the annotation.
pub fn annotate(message: &mut Message, url: &str, config: &EngineConfig) -> bool {
    if message.has_tool_call(&config.share_annotation) {
        return false;
    }
    message.tool_calls.push(share_annotation(url, config));
    message
        .response_metadata
        .get_or_insert_with(ResponseMetadata::default)
        .shared_run_url
        .get_or_insert_with(|| url.to_string());
    true
}

/// Copy-on-write: annotate the most recent message with `message_id`.
///
/// Returns `None` if no message changed.
pub fn attach_shared_run(
    messages: &[Message],
    message_id: &str,
    url: &str,
    config: &EngineConfig,
) -> Option<Vec<Message>> {
    let pos = messages.iter().rposition(|m| m.id == message_id)?;
    let mut next = messages.to_vec();
    annotate(&mut next[pos], url, config).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://smith.langchain.com/public/5f0c9a7e-1111/r";

    #[test]
    fn test_shared_run_id() {
        assert_eq!(shared_run_id(URL, "public").as_deref(), Some("5f0c9a7e-1111"));
        assert_eq!(shared_run_id("https://host/runs/abc?x=1", "public").as_deref(), Some("abc"));
        assert_eq!(shared_run_id("https://host/", "public"), None);
        assert_eq!(shared_run_id("https://host/public", "public").as_deref(), Some("public"));
        assert_eq!(shared_run_id("not a url", "public"), None);
    }

    #[test]
    fn test_shared_run_id_ignores_query_and_fragment() {
        assert_eq!(shared_run_id("https://host?next=/public/evil", "public"), None);
        assert_eq!(shared_run_id("https://host/#/public/evil", "public"), None);
        assert_eq!(
            shared_run_id("https://host/public/abc/r?from=/public/evil#/x", "public").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_attach_is_idempotent() {
        let config = EngineConfig::default();
        let messages = vec![Message::user("u1", "q"), Message::assistant("a1", "answer")];

        let once = attach_shared_run(&messages, "a1", URL, &config).unwrap();
        assert_eq!(once[1].tool_calls.len(), 1);
        assert_eq!(once[1].tool_calls[0].name, "langsmith_tool_ui");
        assert_eq!(once[1].tool_calls[0].id.as_deref(), Some("5f0c9a7e-1111"));
        assert_eq!(once[1].shared_run_url(), Some(URL));
        assert!(messages[1].tool_calls.is_empty());

        assert!(attach_shared_run(&once, "a1", URL, &config).is_none());
        assert!(attach_shared_run(&messages, "missing", URL, &config).is_none());
    }
}
