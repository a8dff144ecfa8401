//! Folding chat chunks into the message list.

use scribe_types::Message;
use serde::{Deserialize, Serialize};

/// How successive chunks for one message relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    /// Each chunk carries the whole message so far; the latest one wins.
    #[default]
    Cumulative,
    /// Each chunk carries only new text, appended to what is there.
    Incremental,
}

/// Fold one chunk into a message list.
///
/// The most recent message sharing the chunk's `id` is replaced by the merged
/// message; if there is none the chunk is appended. Pure: `list` is not
/// touched and the returned list never holds two entries the fold created
/// for one id.
pub fn fold_message_chunk(list: &[Message], chunk: Message, mode: ChunkMode) -> Vec<Message> {
    let mut next = list.to_vec();
    match next.iter().rposition(|m| m.id == chunk.id) {
        Some(pos) => {
            let merged = merge(&next[pos], chunk, mode);
            next[pos] = merged;
        }
        None => next.push(chunk),
    }
    next
}

fn merge(existing: &Message, chunk: Message, mode: ChunkMode) -> Message {
    let mut merged = existing.clone();
    match mode {
        ChunkMode::Cumulative => {
            merged.content = chunk.content;
            if !chunk.tool_calls.is_empty() {
                merged.tool_calls = chunk.tool_calls;
            }
        }
        ChunkMode::Incremental => {
            merged.content.push_str(&chunk.content);
            merged.tool_calls.extend(chunk.tool_calls);
        }
    }
    if chunk.response_metadata.is_some() {
        merged.response_metadata = chunk.response_metadata;
    }
    merged
}
