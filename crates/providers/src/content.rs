//! Normalizes model message content to plain text.
//!
//! Chat APIs return `content` either as a string or as an array of typed
//! blocks (`[{"type":"text","text":"..."}, ...]`). Everything past the
//! adapter boundary works with `String`.

use serde_json::Value;

/// Flatten a `content` value to text. Non-text blocks are skipped; `null`
/// and unknown shapes yield an empty string.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(block_text)
            .collect::<Vec<_>>()
            .join(""),
        Value::Object(_) => block_text(content).unwrap_or_default(),
        _ => String::new(),
    }
}

fn block_text(block: &Value) -> Option<String> {
    match block {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let kind = map.get("type").and_then(Value::as_str).unwrap_or("text");
            if kind != "text" && kind != "output_text" {
                return None;
            }
            map.get("text").and_then(Value::as_str).map(String::from)
        }
        _ => None,
    }
}
