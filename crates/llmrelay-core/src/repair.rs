use bytes::Bytes;
use llmrelay_protocol::claude::{synthetic_tool_result_message, tool_result_id, tool_use_id};
use serde_json::Value;

/// Result of running tool-use repair over a claude-dialect request body.
#[derive(Debug)]
pub struct RepairOutcome {
    pub body: Bytes,
    pub repaired: bool,
}

/// Synthesizes a trailing tool_result message for any tool_use block left
/// dangling at the end of the conversation. Every early return hands back
/// the original bytes unchanged — repair is strictly additive and never
/// touches the body on any path that isn't the final append.
pub fn repair_tool_use(body: Bytes) -> RepairOutcome {
    let unchanged = |body: Bytes| RepairOutcome {
        body,
        repaired: false,
    };

    let Ok(mut value) = serde_json::from_slice::<Value>(&body) else {
        return unchanged(body);
    };

    let Some(messages) = value.get_mut("messages").and_then(Value::as_array_mut) else {
        return unchanged(body);
    };
    if messages.is_empty() {
        return unchanged(body);
    }

    let Some(last_assistant) = messages
        .iter()
        .rposition(|m| m.get("role").and_then(Value::as_str) == Some("assistant"))
    else {
        return unchanged(body);
    };

    let Some(content) = messages[last_assistant].get("content").and_then(Value::as_array) else {
        return unchanged(body);
    };

    let dangling_ids: Vec<String> = content.iter().filter_map(tool_use_id).collect();
    if dangling_ids.is_empty() {
        return unchanged(body);
    }

    if let Some(next) = messages.get(last_assistant + 1) {
        let already_repaired = next.get("role").and_then(Value::as_str) == Some("user")
            && next
                .get("content")
                .and_then(Value::as_array)
                .map(|items| items.iter().any(|item| tool_result_id(item).is_some()))
                .unwrap_or(false);
        if already_repaired {
            return unchanged(body);
        }
    }

    messages.push(synthetic_tool_result_message(&dangling_ids));

    let repaired_bytes = serde_json::to_vec(&value).expect("Value serialization cannot fail");
    RepairOutcome {
        body: Bytes::from(repaired_bytes),
        repaired: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn appends_tool_results_for_dangling_tool_use_blocks() {
        let input = json!({
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": "hi"}]},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "..."},
                    {"type": "tool_use", "id": "T1"},
                    {"type": "tool_use", "id": "T2"},
                ]},
            ]
        });
        let outcome = repair_tool_use(body(input));
        assert!(outcome.repaired);

        let parsed: Value = serde_json::from_slice(&outcome.body).unwrap();
        let messages = parsed["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        let appended = &messages[2];
        assert_eq!(appended["role"], "user");
        let content = appended["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["tool_use_id"], "T1");
        assert_eq!(content[1]["tool_use_id"], "T2");
        assert_eq!(content[0]["is_error"], true);
    }

    #[test]
    fn already_repaired_conversation_is_left_unchanged() {
        let input = json!({
            "messages": [
                {"role": "assistant", "content": [{"type": "tool_use", "id": "T1"}]},
                {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "T1", "content": "ok"}]},
            ]
        });
        let outcome = repair_tool_use(body(input));
        assert!(!outcome.repaired);
    }

    #[test]
    fn no_trailing_assistant_message_is_unchanged() {
        let input = json!({"messages": [{"role": "user", "content": "hi"}]});
        let outcome = repair_tool_use(body(input));
        assert!(!outcome.repaired);
    }

    #[test]
    fn missing_messages_array_is_unchanged() {
        let outcome = repair_tool_use(body(json!({})));
        assert!(!outcome.repaired);
    }

    #[test]
    fn repair_is_idempotent() {
        let input = json!({
            "messages": [
                {"role": "assistant", "content": [{"type": "tool_use", "id": "T1"}]},
            ]
        });
        let once = repair_tool_use(body(input));
        assert!(once.repaired);
        let twice = repair_tool_use(once.body.clone());
        assert!(!twice.repaired);
        assert_eq!(once.body, twice.body);
    }

    #[test]
    fn repair_never_shortens_the_messages_array() {
        let input = json!({
            "messages": [
                {"role": "assistant", "content": [{"type": "tool_use", "id": "T1"}]},
            ]
        });
        let before_len = input["messages"].as_array().unwrap().len();
        let outcome = repair_tool_use(body(input));
        let parsed: Value = serde_json::from_slice(&outcome.body).unwrap();
        assert!(parsed["messages"].as_array().unwrap().len() >= before_len);
    }

    #[test]
    fn assistant_with_no_tool_use_blocks_is_unchanged() {
        let input = json!({
            "messages": [
                {"role": "assistant", "content": [{"type": "text", "text": "done"}]},
            ]
        });
        let outcome = repair_tool_use(body(input));
        assert!(!outcome.repaired);
    }
}
