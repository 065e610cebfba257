//! Free-text tool-call extraction.
//!
//! Some models lack native structured function calling and are instead
//! prompted to answer with a JSON object like:
//!
//! ```text
//! {"tool": "calculator", "args": {"expression": "2+2*3"}}
//! ```
//!
//! [`extract_tool_call`] normalizes such output into an optional
//! [`ToolCall`] so a conditional edge can route on it. The function is pure
//! and never fails: malformed input, chatty prefixes, or plain prose all
//! degrade to `None`, which is the defined "no tool requested" outcome,
//! not an error.
//!
//! # Algorithm
//!
//! First match wins:
//!
//! 1. If the entire trimmed text parses as a JSON object with both a
//!    `"tool"` and an `"args"` key, that is the call.
//! 2. Otherwise scan left-to-right for the first balanced `{…}` substring
//!    (bracket-depth matching, ignoring braces inside string literals) that
//!    parses to such an object. A candidate with invalid JSON (trailing
//!    commas and the like) is rejected and scanning continues at the next
//!    `{`.
//! 3. Otherwise return `None`.
//!
//! # Examples
//!
//! ```rust
//! use agentgraph_core::extract::extract_tool_call;
//!
//! let call = extract_tool_call(
//!     r#"Sure! {"tool":"calculator","args":{"expression":"2+2"}}"#,
//! ).unwrap();
//! assert_eq!(call.name, "calculator");
//!
//! assert!(extract_tool_call("I think the answer is 4.").is_none());
//! ```

use crate::messages::ToolCall;
use serde_json::Value;
use uuid::Uuid;

/// Parse free-text model output into an optional [`ToolCall`].
///
/// Deterministic and pure apart from the generated call id; performs no I/O
/// and never panics, whatever the input.
pub fn extract_tool_call(text: &str) -> Option<ToolCall> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Fast path: the whole response is the JSON object.
    if let Some(call) = candidate(trimmed) {
        return Some(call);
    }

    // Scan for the first balanced object embedded in surrounding prose.
    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let open = search_from + offset;
        if let Some(end) = balanced_end(trimmed, open) {
            if let Some(call) = candidate(&trimmed[open..end]) {
                return Some(call);
            }
        }
        // Rejected or unbalanced: continue at the next opening brace.
        search_from = open + 1;
    }

    None
}

/// Generate an id for an extracted call.
fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Accept `s` if it is a JSON object holding a string `tool` and an object
/// `args`.
fn candidate(s: &str) -> Option<ToolCall> {
    let value: Value = serde_json::from_str(s).ok()?;
    let object = value.as_object()?;
    let name = object.get("tool")?.as_str()?;
    let args = object.get("args")?;
    if !args.is_object() {
        return None;
    }
    Some(ToolCall {
        id: generate_call_id(),
        name: name.to_string(),
        args: args.clone(),
    })
}

/// Byte index one past the `}` matching the `{` at `open`, or `None` if the
/// object never closes. Braces inside string literals (including escaped
/// quotes) do not count toward the depth.
fn balanced_end(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn whole_text_is_the_call() {
        let call =
            extract_tool_call(r#"{"tool": "calculator", "args": {"expression": "25*48"}}"#)
                .unwrap();
        assert_eq!(call.name, "calculator");
        assert_eq!(call.args, json!({"expression": "25*48"}));
        assert!(call.id.starts_with("call_"));
    }

    #[test]
    fn call_embedded_in_prose() {
        let call = extract_tool_call(
            r#"Sure! {"tool":"calculator","args":{"expression":"2+2"}}"#,
        )
        .unwrap();
        assert_eq!(call.name, "calculator");
        assert_eq!(call.args, json!({"expression": "2+2"}));
    }

    #[test]
    fn plain_text_is_not_a_call() {
        assert!(extract_tool_call("I think the answer is 4.").is_none());
        assert!(extract_tool_call("").is_none());
        assert!(extract_tool_call("   \n  ").is_none());
    }

    #[test]
    fn object_without_tool_and_args_is_ignored() {
        assert!(extract_tool_call(r#"{"answer": 4}"#).is_none());
        assert!(extract_tool_call(r#"{"tool": "calculator"}"#).is_none());
        assert!(extract_tool_call(r#"{"args": {"x": 1}}"#).is_none());
    }

    #[test]
    fn args_must_be_an_object() {
        assert!(extract_tool_call(r#"{"tool": "calculator", "args": "2+2"}"#).is_none());
        assert!(extract_tool_call(r#"{"tool": 3, "args": {}}"#).is_none());
    }

    #[test]
    fn first_balanced_candidate_wins() {
        let text = r#"Step 1: {"tool":"search","args":{"query":"hotels"}}
                      Step 2: {"tool":"calculator","args":{"expression":"2+2"}}"#;
        let call = extract_tool_call(text).unwrap();
        assert_eq!(call.name, "search");
    }

    #[test]
    fn invalid_candidate_is_skipped_and_scanning_continues() {
        // Trailing comma makes the first object invalid JSON.
        let text = r#"{"tool": "broken", "args": {"q": 1,}} then
                      {"tool": "calculator", "args": {"expression": "1+1"}}"#;
        let call = extract_tool_call(text).unwrap();
        assert_eq!(call.name, "calculator");
    }

    #[test]
    fn braces_inside_string_literals_are_ignored() {
        let call = extract_tool_call(
            r#"{"tool": "search", "args": {"query": "use {braces} and \"quotes\" here"}}"#,
        )
        .unwrap();
        assert_eq!(call.args["query"], json!("use {braces} and \"quotes\" here"));
    }

    #[test]
    fn unclosed_object_is_not_a_call() {
        assert!(extract_tool_call(r#"{"tool": "search", "args": {"q": "#).is_none());
    }

    #[test]
    fn nested_args_survive_extraction() {
        let call = extract_tool_call(
            r#"{"tool": "get_travel_budget", "args": {"destination": "Paris", "days": 3, "opts": {"currency": "EUR"}}}"#,
        )
        .unwrap();
        assert_eq!(call.args["opts"]["currency"], json!("EUR"));
    }

    proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(text in ".*") {
            let _ = extract_tool_call(&text);
        }

        #[test]
        fn extracts_from_any_prefix_and_suffix(
            prefix in "[^{}\"\\\\]{0,40}",
            suffix in "[^{}\"\\\\]{0,40}",
        ) {
            let text = format!(
                "{prefix}{{\"tool\": \"calculator\", \"args\": {{\"expression\": \"2+2\"}}}}{suffix}"
            );
            let call = extract_tool_call(&text).unwrap();
            prop_assert_eq!(call.name, "calculator");
        }
    }
}
