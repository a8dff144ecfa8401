//! The event router.
//!
//! A [`Fold`] consumes classified frames one at a time and turns them into
//! whole-state replacements of the artifact or the message list. All
//! transient stream state (accumulated tool-call text, the in-flight span
//! edit, captured highlight and rewrite metadata, the reserved version index)
//! lives in the fold, not in the session, so a fold can be driven frame by
//! frame in isolation.
//!
//! ```text
//!   RawFrame ──classify──► Frame { origin, event }
//!                               │
//!        ┌──────────────┬───────┴──────┬─────────────────┬──────────────┐
//!        ▼              ▼              ▼                 ▼              ▼
//!   chat deltas   generateArtifact  span edits       rewriteArtifact  theme / custom
//!   (messages)    (partial JSON)    (EditCursor)     (meta + buffer)  (buffer)
//! ```
//!
//! Every handler that writes a new version writes it at one reserved index,
//! computed once per fold as `contents.len() + 1`, so a fold yields at most
//! one new version however many frames contribute to it.

use std::collections::HashSet;
use std::sync::Arc;

use scribe_types::{
    Artifact, CodeRange, ContentSnapshot, Message, ProgrammingLanguage, SnapshotKind, TextHighlight,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::FrameError;
use crate::frame::{Frame, FrameEvent, MessageChunk, Origin, RawFrame, REWRITE_META_NAME, REWRITE_MODEL_CALL_NAME};
use crate::messages::fold_message_chunk;
use crate::notify::{Notice, Notifier};
use crate::partial_json::JsonAccumulator;
use crate::patch::{EditCursor, SpanLocator, strip_code_fence};

/// Caller-supplied parameters for one fold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldRequest {
    /// Range of the active code snapshot a ranged edit replaces.
    pub highlighted_code: Option<CodeRange>,
    /// Target language chosen by the caller (e.g. "port to rust").
    pub language_override: Option<ProgrammingLanguage>,
}

impl FoldRequest {
    pub fn with_highlighted_code(mut self, range: CodeRange) -> Self {
        self.highlighted_code = Some(range);
        self
    }

    pub fn with_language(mut self, language: ProgrammingLanguage) -> Self {
        self.language_override = Some(language);
        self
    }
}

/// A structured description of one state change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    ArtifactChanged { artifact: Arc<Artifact> },
    MessagesChanged { messages: Arc<Vec<Message>> },
    /// The whole state was swapped for another conversation's.
    SessionReplaced {
        artifact: Option<Arc<Artifact>>,
        messages: Arc<Vec<Message>>,
    },
    FoldFinished { run_id: Option<String> },
}

/// Target of a whole-document rewrite, captured from a lifecycle-end frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteMeta {
    pub kind: SnapshotKind,
    pub title: Option<String>,
    pub language: Option<ProgrammingLanguage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRewriteMeta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    programming_language: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

impl RewriteMeta {
    /// Read metadata from a node output: either the metadata object itself or
    /// the arguments of its first tool call.
    fn from_output(output: &Value, config: &EngineConfig) -> Option<Self> {
        let candidates = [
            Some(output),
            output.pointer("/tool_calls/0/args"),
            output.pointer("/kwargs/tool_calls/0/args"),
        ];
        candidates.into_iter().flatten().find_map(|value| {
            let raw = RawRewriteMeta::deserialize(value).ok()?;
            let kind = SnapshotKind::from_name(&raw.kind)?;
            let language = raw
                .programming_language
                .or(raw.language)
                .filter(|l| !l.trim().is_empty())
                .map(|l| config.resolve_language(&l));
            Some(Self {
                kind,
                title: raw.title.filter(|t| !t.is_empty()),
                language,
            })
        })
    }
}

/// Transient per-fold state. Fields are written once or only grow.
#[derive(Debug, Default)]
struct StreamState {
    run_id: Option<String>,
    followup_message_id: Option<String>,
    tool_call: JsonAccumulator,
    /// Last parsed generate payload declared code without a language.
    code_without_language: bool,
    rewrite_meta: Option<RewriteMeta>,
    highlight: Option<TextHighlight>,
    cursor: Option<EditCursor>,
    rewritten: String,
    /// The snapshot that was active when an edit first needed it.
    base: Option<Arc<ContentSnapshot>>,
    new_index: Option<u32>,
    aborted: HashSet<Origin>,
    reported: HashSet<(Option<Origin>, FrameError)>,
}

/// What a fold leaves behind.
#[derive(Debug, Clone)]
pub struct FoldSummary {
    pub run_id: Option<String>,
    pub followup_message_id: Option<String>,
    pub artifact: Option<Arc<Artifact>>,
    pub messages: Arc<Vec<Message>>,
    /// Index of the version this fold wrote, if any.
    pub new_index: Option<u32>,
}

type Handled = Result<Option<SessionUpdate>, FrameError>;

/// One fold in progress.
pub struct Fold<'a> {
    config: &'a EngineConfig,
    request: &'a FoldRequest,
    notifier: &'a dyn Notifier,
    artifact: Option<Arc<Artifact>>,
    messages: Arc<Vec<Message>>,
    state: StreamState,
}

impl<'a> Fold<'a> {
    /// Start a fold over the given prior state.
    pub fn new(
        config: &'a EngineConfig,
        request: &'a FoldRequest,
        notifier: &'a dyn Notifier,
        artifact: Option<Arc<Artifact>>,
        messages: Arc<Vec<Message>>,
    ) -> Self {
        Self {
            config,
            request,
            notifier,
            artifact,
            messages,
            state: StreamState::default(),
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        self.state.run_id.as_deref()
    }

    pub fn followup_message_id(&self) -> Option<&str> {
        self.state.followup_message_id.as_deref()
    }

    pub fn artifact(&self) -> Option<&Arc<Artifact>> {
        self.artifact.as_ref()
    }

    pub fn messages(&self) -> &Arc<Vec<Message>> {
        &self.messages
    }

    pub fn reserved_index(&self) -> Option<u32> {
        self.state.new_index
    }

    pub fn rewrite_meta(&self) -> Option<&RewriteMeta> {
        self.state.rewrite_meta.as_ref()
    }

    /// Apply one frame, returning the state change it caused, if any.
    ///
    /// Never fails: malformed frames are logged and skipped, precondition
    /// failures are reported through the notifier.
    pub fn apply(&mut self, raw: RawFrame) -> Option<SessionUpdate> {
        let mut frame = match Frame::classify(raw) {
            Ok(frame) => frame,
            Err(err) => {
                self.reject(None, err);
                return None;
            }
        };
        if self.state.run_id.is_none() {
            if let Some(run_id) = frame.run_id.take() {
                debug!(%run_id, "captured run id");
                self.state.run_id = Some(run_id);
            }
        }
        let origin = frame.origin?;
        if self.state.aborted.contains(&origin) {
            trace!(%origin, "origin aborted for this fold, dropping frame");
            return None;
        }

        match self.route(origin, frame) {
            Ok(update) => update,
            Err(err) => {
                self.reject(Some(origin), err);
                None
            }
        }
    }

    /// End the fold and hand back its final state.
    pub fn finish(mut self) -> FoldSummary {
        if self.state.code_without_language {
            self.reject(Some(Origin::GenerateArtifact), FrameError::MissingLanguage);
        }
        FoldSummary {
            run_id: self.state.run_id,
            followup_message_id: self.state.followup_message_id,
            artifact: self.artifact,
            messages: self.messages,
            new_index: self.state.new_index,
        }
    }

    fn route(&mut self, origin: Origin, frame: Frame) -> Handled {
        match (origin, frame.event) {
            (Origin::UpdateHighlightedText, FrameEvent::Start { input }) => {
                self.capture_highlight(&input);
                Ok(None)
            }
            (Origin::RewriteArtifact, FrameEvent::End { output })
                if frame.name.as_deref() == Some(REWRITE_META_NAME) =>
            {
                self.capture_rewrite_meta(&output)
            }
            (_, FrameEvent::Delta { chunk }) => match origin {
                Origin::GenerateFollowup | Origin::ReplyToGeneralInput => self.fold_chat(chunk),
                Origin::GenerateArtifact => self.generate_artifact(&chunk),
                Origin::UpdateHighlightedText => self.edit_highlighted_text(&chunk),
                Origin::UpdateArtifact => self.edit_code_range(&chunk),
                Origin::RewriteArtifact => self.rewrite_artifact(frame.name.as_deref(), &chunk),
                Origin::RewriteArtifactTheme
                | Origin::RewriteCodeArtifactTheme
                | Origin::CustomAction => self.restyle(origin, &chunk),
            },
            _ => Ok(None),
        }
    }

    // ── Captures ────────────────────────────────────────────────────────

    fn capture_highlight(&mut self, input: &Value) {
        if self.state.highlight.is_some() {
            return;
        }
        let Some(raw) = input.get("highlightedText") else {
            trace!("start frame without highlighted text");
            return;
        };
        match TextHighlight::deserialize(raw) {
            Ok(highlight) => {
                debug!(block_len = highlight.markdown_block.len(), "captured highlighted text");
                self.state.highlight = Some(highlight);
            }
            Err(e) => debug!("unusable highlighted text: {e}"),
        }
    }

    fn capture_rewrite_meta(&mut self, output: &Value) -> Handled {
        if self.state.rewrite_meta.is_some() {
            return Ok(None);
        }
        let meta = RewriteMeta::from_output(output, self.config)
            .ok_or_else(|| FrameError::malformed("rewrite metadata without a usable type"))?;
        debug!(kind = %meta.kind, language = ?meta.language, "captured rewrite metadata");
        self.state.rewrite_meta = Some(meta);
        Ok(None)
    }

    // ── Messages ────────────────────────────────────────────────────────

    fn fold_chat(&mut self, chunk: MessageChunk) -> Handled {
        let id = chunk
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FrameError::malformed("chat chunk without an id"))?;
        if self.state.followup_message_id.is_none() {
            self.state.followup_message_id = Some(id.clone());
        }

        let message = Message::assistant(id, chunk.text());
        let messages = Arc::new(fold_message_chunk(&self.messages, message, self.config.message_chunks));
        self.messages = Arc::clone(&messages);
        Ok(Some(SessionUpdate::MessagesChanged { messages }))
    }

    // ── Artifact generation ─────────────────────────────────────────────

    fn generate_artifact(&mut self, chunk: &MessageChunk) -> Handled {
        let Some(args) = chunk.tool_args() else {
            return Ok(None);
        };
        let Some(parsed) = self.state.tool_call.push(args) else {
            trace!(buffered = self.state.tool_call.buffer().len(), "tool call not parseable yet");
            return Ok(None);
        };
        match self.generated_snapshot(&parsed) {
            Some(snapshot) => self.commit(Artifact::single(snapshot)),
            None => Ok(None),
        }
    }

    /// A snapshot from a (partial) generate payload, once it names both a
    /// body and a type, and for code a language.
    fn generated_snapshot(&mut self, parsed: &Value) -> Option<ContentSnapshot> {
        let body = parsed.get("artifact")?.as_str()?;
        let kind = parsed
            .get("type")
            .and_then(Value::as_str)
            .and_then(SnapshotKind::from_name)?;
        let title = parsed.get("title").and_then(Value::as_str).unwrap_or_default();

        match kind {
            SnapshotKind::Text => Some(ContentSnapshot::text(1, title, body)),
            SnapshotKind::Code => {
                let language = parsed
                    .get("language")
                    .and_then(Value::as_str)
                    .filter(|l| !l.trim().is_empty());
                self.state.code_without_language = language.is_none();
                let language = self.config.resolve_language(language?);
                Some(ContentSnapshot::code(1, title, language, body))
            }
        }
    }

    // ── Span edits ──────────────────────────────────────────────────────

    fn edit_highlighted_text(&mut self, chunk: &MessageChunk) -> Handled {
        let artifact = self.require_artifact()?;
        if self.state.highlight.is_none() {
            return Err(FrameError::NoHighlight);
        }
        let delta = chunk.text();
        if delta.is_empty() {
            return Ok(None);
        }
        let base = self.base_snapshot(&artifact)?;
        let ContentSnapshot::Text(base_text) = base.as_ref() else {
            return Err(FrameError::WrongVariant {
                expected: SnapshotKind::Text,
                found: base.kind(),
            });
        };

        if self.state.cursor.is_none() {
            let highlight = self.state.highlight.as_ref().ok_or(FrameError::NoHighlight)?;
            let cursor = EditCursor::begin(
                &highlight.full_markdown,
                SpanLocator::Block(&highlight.markdown_block),
            )?;
            self.state.cursor = Some(cursor);
        }
        let Some(cursor) = self.state.cursor.as_mut() else {
            return Ok(None);
        };
        cursor.append(&delta);
        let full_markdown = cursor.materialize();

        let index = self.reserve_index(&artifact);
        let snapshot = ContentSnapshot::text(index, base_text.title.clone(), full_markdown);
        self.commit(artifact.with_snapshot_at(snapshot))
    }

    fn edit_code_range(&mut self, chunk: &MessageChunk) -> Handled {
        let artifact = self.require_artifact()?;
        let range = self.request.highlighted_code.ok_or(FrameError::NoCodeRange)?;
        let delta = chunk.text();
        if delta.is_empty() {
            return Ok(None);
        }
        let base = self.base_snapshot(&artifact)?;
        let ContentSnapshot::Code(base_code) = base.as_ref() else {
            return Err(FrameError::WrongVariant {
                expected: SnapshotKind::Code,
                found: base.kind(),
            });
        };

        if self.state.cursor.is_none() {
            self.state.cursor = Some(EditCursor::begin(&base_code.code, SpanLocator::Offsets(range))?);
        }
        let Some(cursor) = self.state.cursor.as_mut() else {
            return Ok(None);
        };
        cursor.append(&delta);
        let code = cursor.materialize_with(strip_code_fence);

        let index = self.reserve_index(&artifact);
        let snapshot = ContentSnapshot::code(index, base_code.title.clone(), base_code.language, code);
        self.commit(artifact.with_snapshot_at(snapshot))
    }

    // ── Whole-document rewrites ─────────────────────────────────────────

    fn rewrite_artifact(&mut self, name: Option<&str>, chunk: &MessageChunk) -> Handled {
        if name.is_some_and(|n| n != REWRITE_MODEL_CALL_NAME) {
            trace!(name, "ignoring rewrite delta from another model call");
            return Ok(None);
        }
        let Some(meta) = self.state.rewrite_meta.clone() else {
            trace!("rewrite delta before metadata, skipping");
            return Ok(None);
        };
        let artifact = self.require_artifact()?;
        let delta = chunk.text();
        if delta.is_empty() {
            return Ok(None);
        }
        let base = self.base_snapshot(&artifact)?;
        self.state.rewritten.push_str(&delta);

        let declared = match meta.kind {
            SnapshotKind::Code => meta.language,
            SnapshotKind::Text => None,
        };
        let language = self.resolve_language(declared.or(base.language()));
        let title = meta.title.as_deref().unwrap_or(base.title());
        self.write_rewrite(&artifact, meta.kind, title, language)
    }

    fn restyle(&mut self, origin: Origin, chunk: &MessageChunk) -> Handled {
        let artifact = self.require_artifact()?;
        let delta = chunk.text();
        if delta.is_empty() {
            return Ok(None);
        }
        let base = self.base_snapshot(&artifact)?;
        self.state.rewritten.push_str(&delta);

        let kind = match origin {
            Origin::RewriteArtifactTheme => SnapshotKind::Text,
            Origin::RewriteCodeArtifactTheme => SnapshotKind::Code,
            _ => base.kind(),
        };
        let language = self.resolve_language(base.language());
        self.write_rewrite(&artifact, kind, base.title(), language)
    }

    /// Request override, then `declared`, then the configured fallback.
    fn resolve_language(&self, declared: Option<ProgrammingLanguage>) -> ProgrammingLanguage {
        self.request
            .language_override
            .or(declared)
            .map(|lang| self.config.constrain(lang))
            .unwrap_or(self.config.fallback_language)
    }

    fn write_rewrite(
        &mut self,
        artifact: &Artifact,
        kind: SnapshotKind,
        title: &str,
        language: ProgrammingLanguage,
    ) -> Handled {
        let index = self.reserve_index(artifact);
        let snapshot = match kind {
            SnapshotKind::Text => ContentSnapshot::text(index, title, self.state.rewritten.as_str()),
            SnapshotKind::Code => {
                ContentSnapshot::code(index, title, language, strip_code_fence(&self.state.rewritten))
            }
        };
        self.commit(artifact.with_snapshot_at(snapshot))
    }

    // ── Shared plumbing ─────────────────────────────────────────────────

    fn require_artifact(&self) -> Result<Arc<Artifact>, FrameError> {
        self.artifact.clone().ok_or(FrameError::NoArtifact)
    }

    fn base_snapshot(&mut self, artifact: &Artifact) -> Result<Arc<ContentSnapshot>, FrameError> {
        if let Some(base) = &self.state.base {
            return Ok(Arc::clone(base));
        }
        let base = artifact
            .current()
            .cloned()
            .map(Arc::new)
            .ok_or(FrameError::NoActiveSnapshot(artifact.current_index))?;
        self.state.base = Some(Arc::clone(&base));
        Ok(base)
    }

    fn reserve_index(&mut self, artifact: &Artifact) -> u32 {
        *self.state.new_index.get_or_insert_with(|| {
            let index = artifact.next_index();
            debug!(index, "reserved index for new version");
            index
        })
    }

    fn commit(&mut self, artifact: Artifact) -> Handled {
        let artifact = Arc::new(artifact);
        trace!(
            current_index = artifact.current_index,
            versions = artifact.len(),
            "artifact updated"
        );
        self.artifact = Some(Arc::clone(&artifact));
        Ok(Some(SessionUpdate::ArtifactChanged { artifact }))
    }

    fn reject(&mut self, origin: Option<Origin>, err: FrameError) {
        if err.is_reportable() {
            if self.state.reported.insert((origin, err.clone())) {
                warn!(origin = ?origin, "{err}");
                self.notifier.notify(&Notice::from_frame_error(origin, &err));
            }
        } else {
            debug!(origin = ?origin, "skipping frame: {err}");
        }
        if err.aborts_origin() {
            if let Some(origin) = origin {
                self.state.aborted.insert(origin);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Notice>>);

    impl Notifier for Collect {
        fn notify(&self, notice: &Notice) {
            self.0.lock().push(notice.clone());
        }
    }

    fn delta(node: &str, content: &str) -> RawFrame {
        RawFrame::new("on_chat_model_stream", node).with_chunk(json!({"id": "m1", "content": content}))
    }

    fn code_artifact(code: &str) -> Option<Arc<Artifact>> {
        Some(Arc::new(Artifact::single(ContentSnapshot::code(
            1,
            "snippet",
            ProgrammingLanguage::Python,
            code,
        ))))
    }

    fn text_artifact(markdown: &str) -> Option<Arc<Artifact>> {
        Some(Arc::new(Artifact::single(ContentSnapshot::text(1, "doc", markdown))))
    }

    #[test]
    fn test_run_id_captured_once() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, None, Arc::default());

        fold.apply(RawFrame::new("on_chain_start", "__start__"));
        // Unclassifiable frames contribute nothing, not even their run id.
        fold.apply(RawFrame::new("on_chat_model_stream", "generateFollowup").with_run_id("malformed"));
        fold.apply(RawFrame::new("on_chain_start", "__start__").with_run_id("first"));
        fold.apply(RawFrame::new("on_chain_start", "__start__").with_run_id("second"));
        assert_eq!(fold.run_id(), Some("first"));
    }

    #[test]
    fn test_highlight_edit_without_artifact_aborts_origin() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, None, Arc::default());

        assert!(fold.apply(delta("updateHighlightedText", "a")).is_none());
        assert!(fold.apply(delta("updateHighlightedText", "b")).is_none());
        let notes = notes.0.lock();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "No artifact found");
    }

    #[test]
    fn test_delta_before_highlight_is_reported() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, text_artifact("Hello"), Arc::default());

        assert!(fold.apply(delta("updateHighlightedText", "x")).is_none());
        // Aborted: a late start frame no longer revives the edit.
        fold.apply(
            RawFrame::new("on_chain_start", "updateHighlightedText")
                .with_input(json!({"highlightedText": {"fullMarkdown": "Hello", "markdownBlock": "Hello"}})),
        );
        assert!(fold.apply(delta("updateHighlightedText", "y")).is_none());
        assert_eq!(notes.0.lock().len(), 1);
        assert_eq!(fold.artifact().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_wrong_variant_skips_but_does_not_abort() {
        let config = EngineConfig::default();
        let request = FoldRequest::default().with_highlighted_code(CodeRange::new(0, 1));
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, text_artifact("prose"), Arc::default());

        assert!(fold.apply(delta("updateArtifact", "x")).is_none());
        assert!(fold.apply(delta("updateArtifact", "y")).is_none());
        // Reported once per fold, not per frame.
        let notes = notes.0.lock();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Unsupported artifact type");
    }

    #[test]
    fn test_rewrite_waits_for_metadata() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, code_artifact("old"), Arc::default());

        let early = delta("rewriteArtifact", "lost").with_name(REWRITE_MODEL_CALL_NAME);
        assert!(fold.apply(early).is_none());

        fold.apply(
            RawFrame::new("on_chain_end", "rewriteArtifact")
                .with_name(REWRITE_META_NAME)
                .with_output(json!({"type": "code", "title": "Ported", "language": "rust"})),
        );
        assert_eq!(
            fold.rewrite_meta(),
            Some(&RewriteMeta {
                kind: SnapshotKind::Code,
                title: Some("Ported".into()),
                language: Some(ProgrammingLanguage::Rust),
            })
        );

        fold.apply(delta("rewriteArtifact", "```rust\nfn a() {}").with_name(REWRITE_MODEL_CALL_NAME));
        let update = fold.apply(delta("rewriteArtifact", "\n```").with_name(REWRITE_MODEL_CALL_NAME));
        let Some(SessionUpdate::ArtifactChanged { artifact }) = update else {
            panic!("expected artifact update");
        };
        assert_eq!(artifact.len(), 2);
        assert_eq!(
            artifact.current(),
            Some(&ContentSnapshot::code(2, "Ported", ProgrammingLanguage::Rust, "fn a() {}"))
        );
        assert!(notes.0.lock().is_empty());
    }

    #[test]
    fn test_rewrite_meta_from_tool_call_args() {
        let config = EngineConfig::default();
        let output = json!({"tool_calls": [{"name": "update_meta", "args": {"type": "text", "title": "T"}}]});
        let meta = RewriteMeta::from_output(&output, &config).unwrap();
        assert_eq!(meta.kind, SnapshotKind::Text);
        assert_eq!(meta.language, None);
        assert!(RewriteMeta::from_output(&json!({"nothing": true}), &config).is_none());
    }

    #[test]
    fn test_rewrite_language_precedence() {
        let config = EngineConfig::default();
        let notes = Collect::default();
        let meta_frame = |language: Option<&str>| {
            let mut output = json!({"type": "code", "title": "t"});
            if let Some(language) = language {
                output["programmingLanguage"] = json!(language);
            }
            RawFrame::new("on_chain_end", "rewriteArtifact")
                .with_name(REWRITE_META_NAME)
                .with_output(output)
        };
        let run = |request: &FoldRequest, language: Option<&str>| {
            let mut fold = Fold::new(&config, request, &notes, code_artifact("x = 1"), Arc::default());
            fold.apply(meta_frame(language));
            fold.apply(delta("rewriteArtifact", "body"));
            fold.finish().artifact.and_then(|a| a.current().and_then(|c| c.language()))
        };

        let plain = FoldRequest::default();
        let overridden = FoldRequest::default().with_language(ProgrammingLanguage::Php);
        assert_eq!(run(&overridden, Some("rust")), Some(ProgrammingLanguage::Php));
        assert_eq!(run(&plain, Some("rust")), Some(ProgrammingLanguage::Rust));
        assert_eq!(run(&plain, None), Some(ProgrammingLanguage::Python));
    }

    #[test]
    fn test_rewrite_metadata_language_needs_code_kind() {
        let config = EngineConfig {
            fallback_language: ProgrammingLanguage::Go,
            ..EngineConfig::default()
        };
        let request = FoldRequest::default();
        let notes = Collect::default();
        let run = |artifact: Option<Arc<Artifact>>, kind: &str, language: Option<&str>| {
            let mut output = json!({"type": kind, "title": "t"});
            if let Some(language) = language {
                output["programmingLanguage"] = json!(language);
            }
            let mut fold = Fold::new(&config, &request, &notes, artifact, Arc::default());
            fold.apply(
                RawFrame::new("on_chain_end", "rewriteArtifact")
                    .with_name(REWRITE_META_NAME)
                    .with_output(output),
            );
            fold.apply(delta("rewriteArtifact", "body"));
            fold.finish().artifact.and_then(|a| a.current().cloned())
        };

        // A language declared next to `type: text` is ignored.
        assert_eq!(
            run(code_artifact("x = 1"), "text", Some("rust")),
            Some(ContentSnapshot::text(2, "t", "body"))
        );
        // Nothing declared and a text base: the configured fallback.
        assert_eq!(
            run(text_artifact("# doc"), "code", None),
            Some(ContentSnapshot::code(2, "t", ProgrammingLanguage::Go, "body"))
        );
        assert_eq!(
            run(text_artifact("# doc"), "code", Some("rust")),
            Some(ContentSnapshot::code(2, "t", ProgrammingLanguage::Rust, "body"))
        );
    }

    #[test]
    fn test_theme_rewrite_forces_kind() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, code_artifact("print(1)"), Arc::default());

        fold.apply(delta("rewriteArtifactTheme", "# Now prose"));
        let summary = fold.finish();
        let artifact = summary.artifact.unwrap();
        assert_eq!(artifact.current(), Some(&ContentSnapshot::text(2, "snippet", "# Now prose")));
        assert_eq!(summary.new_index, Some(2));
    }

    #[test]
    fn test_custom_action_inherits_kind_and_language() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, code_artifact("print(1)"), Arc::default());

        fold.apply(delta("customAction", "# commented\n"));
        fold.apply(delta("customAction", "print(1)"));
        let artifact = fold.finish().artifact.unwrap();
        assert_eq!(
            artifact.current(),
            Some(&ContentSnapshot::code(2, "snippet", ProgrammingLanguage::Python, "# commented\nprint(1)"))
        );
    }

    #[test]
    fn test_generate_code_without_language_reported_at_finish() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, None, Arc::default());

        let frame = RawFrame::new("on_chat_model_stream", "generateArtifact").with_chunk(json!({
            "id": "m",
            "content": "",
            "tool_call_chunks": [{"args": "{\"artifact\": \"x\", \"type\": \"code\"}"}]
        }));
        assert!(fold.apply(frame).is_none());
        let summary = fold.finish();
        assert!(summary.artifact.is_none());
        let notes = notes.0.lock();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Missing language");
    }

    #[test]
    fn test_malformed_frames_are_silent() {
        let config = EngineConfig::default();
        let request = FoldRequest::default();
        let notes = Collect::default();
        let mut fold = Fold::new(&config, &request, &notes, None, Arc::default());

        assert!(fold.apply(RawFrame::new("on_chat_model_stream", "generateFollowup")).is_none());
        let no_id = RawFrame::new("on_chat_model_stream", "generateFollowup").with_chunk(json!({"content": "hi"}));
        assert!(fold.apply(no_id).is_none());
        assert!(notes.0.lock().is_empty());
        assert!(fold.messages().is_empty());
    }
}
