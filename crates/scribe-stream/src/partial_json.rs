//! Best-effort parsing of truncated JSON.
//!
//! Tool-call arguments stream in as fragments of one JSON value. After each
//! fragment the buffer is a prefix of valid JSON cut at an arbitrary
//! character. [`parse_partial`] closes whatever is open (strings, objects,
//! arrays) and, if the result still does not parse, drops trailing
//! characters until it does.

use serde_json::Value;

/// Parse a possibly truncated JSON document.
///
/// Returns `None` when no value can be derived yet, or when the text is not a
/// prefix of valid JSON at all (mismatched brackets). Never panics.
pub fn parse_partial(buffer: &str) -> Option<Value> {
    if buffer.trim().is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(buffer) {
        return Some(value);
    }

    let mut repaired = String::with_capacity(buffer.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Byte offsets in `repaired` of the quote opening the latest string and
    // of the backslashes opening its last two escapes.
    let mut string_start = 0;
    let mut last_escape: Option<usize> = None;
    let mut prev_escape: Option<usize> = None;

    for c in buffer.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '"' {
                in_string = false;
            } else if c == '\\' {
                escaped = true;
                prev_escape = last_escape;
                last_escape = Some(repaired.len());
            } else if c == '\n' {
                repaired.push_str("\\n");
                continue;
            }
        } else {
            match c {
                '"' => {
                    in_string = true;
                    string_start = repaired.len();
                    last_escape = None;
                    prev_escape = None;
                }
                '{' => closers.push('}'),
                '[' => closers.push(']'),
                '}' | ']' => {
                    if closers.last() == Some(&c) {
                        closers.pop();
                    } else {
                        return None;
                    }
                }
                _ => {}
            }
        }
        repaired.push(c);
    }

    let tail: String = closers.iter().rev().collect();

    if in_string {
        repaired.truncate(open_string_cut(&repaired, escaped, last_escape, prev_escape));
        // Back off inside the string, closing it again on every attempt.
        while repaired.len() > string_start {
            if let Ok(value) = serde_json::from_str(&format!("{repaired}\"{tail}")) {
                return Some(value);
            }
            repaired.pop();
        }
    }

    loop {
        let candidate = format!("{repaired}{tail}");
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Some(value);
        }
        repaired.pop()?;
    }
}

/// Where the text of an open string must end for a closing quote to make it
/// valid: before a dangling `\`, before a `\uXX` cut short, and before a high
/// surrogate whose low half has not arrived yet.
fn open_string_cut(repaired: &str, escaped: bool, last_escape: Option<usize>, prev_escape: Option<usize>) -> usize {
    let mut end = repaired.len();
    let mut latest = last_escape;
    if let Some(start) = last_escape {
        let escape = &repaired[start..];
        if escaped || (escape.starts_with("\\u") && escape.len() < 6) {
            end = start;
            latest = prev_escape;
        }
    }
    if let Some(start) = latest {
        if is_high_surrogate(&repaired[start..end]) {
            end = start;
        }
    }
    end
}

fn is_high_surrogate(escape: &str) -> bool {
    escape.len() == 6
        && escape.starts_with("\\u")
        && u16::from_str_radix(&escape[2..], 16).is_ok_and(|unit| (0xD800..=0xDBFF).contains(&unit))
}

/// Growing buffer of JSON fragments for one streamed value.
#[derive(Debug, Clone, Default)]
pub struct JsonAccumulator {
    buffer: String,
}

impl JsonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and re-parse the whole buffer.
    pub fn push(&mut self, fragment: &str) -> Option<Value> {
        self.buffer.push_str(fragment);
        self.parse()
    }

    /// Parse what has been accumulated so far.
    pub fn parse(&self) -> Option<Value> {
        parse_partial(&self.buffer)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_complete_document_parses_directly() {
        assert_eq!(parse_partial(r#"{"a": [1, 2]}"#), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_unterminated_string_is_closed() {
        assert_eq!(
            parse_partial(r#"{"artifact":"function ad"#),
            Some(json!({"artifact": "function ad"}))
        );
    }

    #[test]
    fn test_nested_structures_are_closed() {
        assert_eq!(
            parse_partial(r#"{"a": {"b": [1, {"c": "x"#),
            Some(json!({"a": {"b": [1, {"c": "x"}]}}))
        );
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        assert_eq!(parse_partial(r#"{"title": "t", "type"#), Some(json!({"title": "t"})));
        assert_eq!(parse_partial(r#"{"title": "t", "type":"#), Some(json!({"title": "t"})));
        assert_eq!(parse_partial(r#"{"title": "t","#), Some(json!({"title": "t"})));
    }

    #[test]
    fn test_truncated_literal_backs_off() {
        assert_eq!(parse_partial(r#"{"ok": tr"#), Some(json!({})));
        assert_eq!(parse_partial(r#"{"n": 12"#), Some(json!({"n": 12})));
    }

    #[test]
    fn test_raw_newline_inside_string() {
        assert_eq!(parse_partial("{\"code\": \"a\nb"), Some(json!({"code": "a\nb"})));
    }

    #[test]
    fn test_cut_escapes() {
        assert_eq!(parse_partial(r#"{"s": "a\"#), Some(json!({"s": "a"})));
        assert_eq!(parse_partial(r#"{"s": "a\u00"#), Some(json!({"s": "a"})));
        assert_eq!(parse_partial(r#"{"s": "a\"b"#), Some(json!({"s": "a\"b"})));
    }

    #[test]
    fn test_cut_surrogate_pair() {
        assert_eq!(
            parse_partial(r#"{"artifact":"hello \uD83D"#),
            Some(json!({"artifact": "hello "}))
        );
        assert_eq!(parse_partial(r#"{"s": "a\uD83D\uDE"#), Some(json!({"s": "a"})));
        assert_eq!(parse_partial(r#"{"s": "a\uD83D\"#), Some(json!({"s": "a"})));
        assert_eq!(parse_partial(r#"{"s": "a\uD83D\uDE00"#), Some(json!({"s": "a\u{1F600}"})));
        // An escaped backslash followed by text that merely looks like an escape.
        assert_eq!(parse_partial(r#"{"s": "a\\uD83D"#), Some(json!({"s": "a\\uD83D"})));
    }

    #[test]
    fn test_cut_surrogate_keeps_long_body() {
        let body = "x".repeat(50_000);
        let buffer = format!(r#"{{"artifact":"{body}\uD83D"#);
        assert_eq!(parse_partial(&buffer), Some(json!({ "artifact": body })));
    }

    #[test]
    fn test_backoff_keeps_string_closed() {
        assert_eq!(parse_partial(r#"{"s": "abc\x"#), Some(json!({"s": "abc"})));
        assert_eq!(parse_partial(r#"{"n": 1, "s": "ok\x"#), Some(json!({"n": 1, "s": "ok"})));
    }

    #[test]
    fn test_incomplete_and_invalid_input() {
        assert_eq!(parse_partial(""), None);
        assert_eq!(parse_partial("   "), None);
        assert_eq!(parse_partial(r#"{"a": 1]"#), None);
        assert_eq!(parse_partial("nonsense"), None);
    }

    #[test]
    fn test_accumulator_grows() {
        let mut acc = JsonAccumulator::new();
        assert_eq!(acc.push(r#"{"artifact":"x"#), Some(json!({"artifact": "x"})));
        assert_eq!(acc.push(r#"y","type":"text"}"#), Some(json!({"artifact": "xy", "type": "text"})));
        assert_eq!(acc.buffer(), r#"{"artifact":"xy","type":"text"}"#);
    }
}
