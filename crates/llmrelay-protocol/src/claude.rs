//! JSON shapes used by the Tool-Use Repair step.
//!
//! Request bodies are otherwise carried as opaque `serde_json::Value`
//! through the relay so that fields this gateway doesn't know about are
//! never dropped on the way to the upstream. Repair is the one place the
//! gateway has to construct new JSON rather than just read it, so the
//! shape of what it constructs gets a typed home here instead of being
//! built ad hoc with `json!` at the call site.

use serde_json::{json, Value};

/// Text placed in the synthetic `tool_result` block for a `tool_use` that
/// never got a matching result because the conversation was cut over to a
/// different provider mid-turn.
pub const DANGLING_TOOL_RESULT_TEXT: &str =
    "Tool execution was interrupted because the conversation was routed to a different provider.";

/// Builds the repair message appended to `messages` for a run of dangling
/// tool_use ids collected from the trailing assistant turn.
///
/// `dangling_ids` must preserve the order the corresponding `tool_use`
/// blocks appeared in within the assistant message.
pub fn synthetic_tool_result_message(dangling_ids: &[String]) -> Value {
    let content: Vec<Value> = dangling_ids
        .iter()
        .map(|id| {
            json!({
                "type": "tool_result",
                "tool_use_id": id,
                "content": DANGLING_TOOL_RESULT_TEXT,
                "is_error": true,
            })
        })
        .collect();
    json!({
        "role": "user",
        "content": content,
    })
}

/// Returns the `id` of a `content` array entry if it is a `tool_use` block
/// with a non-empty `id`, else `None`.
pub fn tool_use_id(block: &Value) -> Option<String> {
    let obj = block.as_object()?;
    if obj.get("type")?.as_str()? != "tool_use" {
        return None;
    }
    let id = obj.get("id")?.as_str()?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Returns the `tool_use_id` of a `content` array entry if it is a
/// `tool_result` block.
pub fn tool_result_id(block: &Value) -> Option<String> {
    let obj = block.as_object()?;
    if obj.get("type")?.as_str()? != "tool_result" {
        return None;
    }
    obj.get("tool_use_id")?.as_str().map(|s| s.to_string())
}
