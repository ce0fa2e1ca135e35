use serde_json::Value;

/// Join the text blocks of a content list in order, trimmed, one per line.
///
/// Blocks whose `type` is anything other than `"text"` are ignored. A bare
/// string is treated as a single text block, which some producers emit for
/// short user turns.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(blocks) => extract_text_blocks(blocks),
        _ => String::new(),
    }
}

pub fn extract_text_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
