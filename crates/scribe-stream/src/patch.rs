//! Span patching: splice a growing replacement between a frozen prefix and
//! suffix of the original document.
//!
//! ```text
//!   original:  [ prefix ][ highlighted span ][ suffix ]
//!   streaming: [ prefix ][ d1 d2 d3 ...      ][ suffix ]
//! ```
//!
//! The prefix and suffix are cut exactly once, when the cursor is created.
//! Every delta only grows the replacement, so the reconstructed document is
//! the same however the delta text was chunked.

use scribe_types::CodeRange;

use crate::error::FrameError;

/// How to find the span being replaced.
#[derive(Debug, Clone, Copy)]
pub enum SpanLocator<'a> {
    /// Explicit character offsets into the original.
    Offsets(CodeRange),
    /// First occurrence of this block inside the original.
    Block(&'a str),
}

/// An in-flight span edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCursor {
    prefix: String,
    replacement: String,
    suffix: String,
}

impl EditCursor {
    /// Split `original` around the located span.
    pub fn begin(original: &str, locator: SpanLocator<'_>) -> Result<Self, FrameError> {
        let (start, end) = match locator {
            SpanLocator::Block(block) => {
                let start = original.find(block).ok_or(FrameError::BlockNotFound)?;
                (start, start + block.len())
            }
            SpanLocator::Offsets(range) => {
                let out_of_bounds = || FrameError::RangeOutOfBounds {
                    start: range.start_char_index,
                    end: range.end_char_index,
                    len: original.chars().count(),
                };
                if range.start_char_index > range.end_char_index {
                    return Err(out_of_bounds());
                }
                let start = byte_offset(original, range.start_char_index).ok_or_else(out_of_bounds)?;
                let end = byte_offset(original, range.end_char_index).ok_or_else(out_of_bounds)?;
                (start, end)
            }
        };

        Ok(Self {
            prefix: original[..start].to_string(),
            replacement: String::new(),
            suffix: original[end..].to_string(),
        })
    }

    /// Grow the replacement.
    pub fn append(&mut self, delta: &str) {
        self.replacement.push_str(delta);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Replacement text received so far.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// The whole document as it stands: `prefix + replacement + suffix`.
    pub fn materialize(&self) -> String {
        self.materialize_with(|text| text)
    }

    /// Like [`materialize`](Self::materialize), passing the replacement
    /// through `clean` first (e.g. [`strip_code_fence`]).
    pub fn materialize_with(&self, clean: impl for<'t> Fn(&'t str) -> &'t str) -> String {
        let replacement = clean(&self.replacement);
        let mut out = String::with_capacity(self.prefix.len() + replacement.len() + self.suffix.len());
        out.push_str(&self.prefix);
        out.push_str(replacement);
        out.push_str(&self.suffix);
        out
    }
}

/// Byte offset of the `chars`-th character; `len()` for one past the end.
fn byte_offset(s: &str, chars: usize) -> Option<usize> {
    s.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

/// Unwrap text enclosed in a single fenced code block.
///
/// Only a fence spanning the whole string is removed:
/// `` ```lang\n<body>\n``` `` (optionally followed by one newline) yields
/// `<body>` exactly. Anything else, including a fence still waiting for its
/// closing line, is returned unchanged.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(newline) = rest.find('\n') else {
        return text;
    };
    let info = &rest[..newline];
    if !info
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#' | '.'))
    {
        return text;
    }
    // Keep the newline: an empty body is "```\n\n```".
    let body = &rest[newline..];
    let body = body.strip_suffix('\n').filter(|b| b.ends_with("\n```")).unwrap_or(body);
    match body.strip_suffix("\n```") {
        Some(inner) => inner.strip_prefix('\n').unwrap_or(inner),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_block_locator_first_occurrence() {
        let mut cursor = EditCursor::begin("## Title\n\nHello world", SpanLocator::Block("Hello world")).unwrap();
        assert_eq!(cursor.prefix(), "## Title\n\n");
        assert_eq!(cursor.suffix(), "");
        cursor.append("Hi");
        cursor.append(" there");
        assert_eq!(cursor.materialize(), "## Title\n\nHi there");

        let cursor = EditCursor::begin("ab ab", SpanLocator::Block("ab")).unwrap();
        assert_eq!(cursor.prefix(), "");
        assert_eq!(cursor.suffix(), " ab");
    }

    #[test]
    fn test_offsets_locator_counts_chars() {
        let cursor = EditCursor::begin("abc123xyz", SpanLocator::Offsets(CodeRange::new(3, 6))).unwrap();
        assert_eq!(cursor.prefix(), "abc");
        assert_eq!(cursor.suffix(), "xyz");

        let cursor = EditCursor::begin("héllo", SpanLocator::Offsets(CodeRange::new(1, 2))).unwrap();
        assert_eq!(cursor.prefix(), "h");
        assert_eq!(cursor.suffix(), "llo");

        let cursor = EditCursor::begin("abc", SpanLocator::Offsets(CodeRange::new(3, 3))).unwrap();
        assert_eq!(cursor.materialize(), "abc");
    }

    #[test]
    fn test_locator_failures() {
        assert_eq!(
            EditCursor::begin("abc", SpanLocator::Block("zzz")),
            Err(FrameError::BlockNotFound)
        );
        assert_eq!(
            EditCursor::begin("abc", SpanLocator::Offsets(CodeRange::new(1, 9))),
            Err(FrameError::RangeOutOfBounds { start: 1, end: 9, len: 3 })
        );
        assert!(EditCursor::begin("abc", SpanLocator::Offsets(CodeRange::new(2, 1))).is_err());
    }

    #[test]
    fn test_code_edit_strips_fence_around_replacement() {
        let mut cursor = EditCursor::begin("abc123xyz", SpanLocator::Offsets(CodeRange::new(3, 6))).unwrap();
        cursor.append("```js\nXXX");
        assert_eq!(cursor.materialize_with(strip_code_fence), "abc```js\nXXXxyz");
        cursor.append("\n```");
        assert_eq!(cursor.materialize_with(strip_code_fence), "abcXXXxyz");
    }

    #[test]
    fn test_strip_code_fence_cases() {
        assert_eq!(strip_code_fence("```rust\nfn main() {}\n```"), "fn main() {}");
        assert_eq!(strip_code_fence("```\nx\n```\n"), "x");
        assert_eq!(strip_code_fence("```\n\n```"), "");
        assert_eq!(strip_code_fence("```c++\na\n```"), "a");
        assert_eq!(strip_code_fence("plain"), "plain");
        assert_eq!(strip_code_fence("```js\nunterminated"), "```js\nunterminated");
        assert_eq!(strip_code_fence("```"), "```");
        assert_eq!(strip_code_fence("```not a tag\nx\n```"), "```not a tag\nx\n```");
        // Inner fences are content, not the wrapper.
        assert_eq!(strip_code_fence("```md\na\n```\nb\n```"), "a\n```\nb");
    }

    proptest! {
        #[test]
        fn prop_fence_roundtrip(body in any::<String>(), tag in "[a-z+#]{0,6}") {
            let wrapped = format!("```{tag}\n{body}\n```");
            prop_assert_eq!(strip_code_fence(&wrapped), body.as_str());
        }

        #[test]
        fn prop_chunking_is_irrelevant(
            original in "[a-z\n ]{0,40}",
            delta in "\\PC{0,60}",
            cuts in proptest::collection::vec(any::<usize>(), 0..8),
            a in any::<usize>(),
            b in any::<usize>(),
        ) {
            let len = original.chars().count();
            let (start, end) = {
                let (x, y) = (a % (len + 1), b % (len + 1));
                (x.min(y), x.max(y))
            };
            let range = CodeRange::new(start, end);

            let mut whole = EditCursor::begin(&original, SpanLocator::Offsets(range)).unwrap();
            whole.append(&delta);

            let chars: Vec<char> = delta.chars().collect();
            let mut points: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
            points.push(0);
            points.push(chars.len());
            points.sort_unstable();
            points.dedup();

            let mut chunked = EditCursor::begin(&original, SpanLocator::Offsets(range)).unwrap();
            for pair in points.windows(2) {
                let piece: String = chars[pair[0]..pair[1]].iter().collect();
                chunked.append(&piece);
            }

            let expected = format!("{}{}{}", whole.prefix(), delta, whole.suffix());
            prop_assert_eq!(chunked.materialize(), expected.clone());
            prop_assert_eq!(whole.materialize(), expected);
        }
    }
}
