use serde_json::Value;

/// Token-usage counters accumulated for one attempt's `request_log` row.
/// Every dialect reports these under a different shape; this only ever
/// widens (later non-null values win), so a partial event followed by a
/// fuller one still ends with the fuller numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_create_tokens: i64,
    pub cache_read_tokens: i64,
    pub reasoning_tokens: i64,
}

impl TokenUsage {
    fn merge_from(&mut self, other: TokenUsage) {
        if other.input_tokens != 0 {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens != 0 {
            self.output_tokens = other.output_tokens;
        }
        if other.cache_create_tokens != 0 {
            self.cache_create_tokens = other.cache_create_tokens;
        }
        if other.cache_read_tokens != 0 {
            self.cache_read_tokens = other.cache_read_tokens;
        }
        if other.reasoning_tokens != 0 {
            self.reasoning_tokens = other.reasoning_tokens;
        }
    }
}

fn i64_field(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Looks for claude, codex (OpenAI chat/responses), and gemini usage
/// shapes anywhere a `usage`/`usageMetadata` object might appear in one
/// decoded JSON event or full response body.
pub fn extract_from_value(value: &Value) -> TokenUsage {
    let mut usage = TokenUsage::default();

    if let Some(claude_usage) = value.get("usage").or_else(|| value.pointer("/message/usage")) {
        usage.merge_from(TokenUsage {
            input_tokens: i64_field(claude_usage, "input_tokens"),
            output_tokens: i64_field(claude_usage, "output_tokens"),
            cache_create_tokens: i64_field(claude_usage, "cache_creation_input_tokens"),
            cache_read_tokens: i64_field(claude_usage, "cache_read_input_tokens"),
            reasoning_tokens: 0,
        });

        // OpenAI chat/responses usage reuses the same top-level `usage` key
        // with its own field names; both shapes are attempted since only
        // one will ever have non-zero fields for a given dialect.
        let reasoning_tokens = claude_usage
            .pointer("/completion_tokens_details/reasoning_tokens")
            .or_else(|| claude_usage.pointer("/output_tokens_details/reasoning_tokens"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        usage.merge_from(TokenUsage {
            input_tokens: i64_field(claude_usage, "prompt_tokens")
                .max(i64_field(claude_usage, "input_tokens")),
            output_tokens: i64_field(claude_usage, "completion_tokens")
                .max(i64_field(claude_usage, "output_tokens")),
            cache_create_tokens: 0,
            cache_read_tokens: claude_usage
                .pointer("/prompt_tokens_details/cached_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            reasoning_tokens,
        });
    }

    if let Some(gemini_usage) = value.get("usageMetadata") {
        usage.merge_from(TokenUsage {
            input_tokens: i64_field(gemini_usage, "promptTokenCount"),
            output_tokens: i64_field(gemini_usage, "candidatesTokenCount"),
            cache_create_tokens: 0,
            cache_read_tokens: i64_field(gemini_usage, "cachedContentTokenCount"),
            reasoning_tokens: i64_field(gemini_usage, "thoughtsTokenCount"),
        });
    }

    usage
}

/// Incremental SSE usage accumulator. Feed raw chunks as they stream past;
/// `carry` holds any trailing partial line between calls since event
/// boundaries rarely align with transport chunk boundaries.
pub fn accumulate_sse_chunk(usage: &mut TokenUsage, chunk: &[u8], carry: &mut Vec<u8>) {
    carry.extend_from_slice(chunk);

    let mut consumed = 0;
    while let Some(pos) = carry[consumed..].iter().position(|&b| b == b'\n') {
        let line_end = consumed + pos;
        let line = String::from_utf8_lossy(&carry[consumed..line_end]);
        let line = line.trim_end_matches('\r').trim();

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if data != "[DONE]"
                && let Ok(value) = serde_json::from_str::<Value>(data)
            {
                usage.merge_from(extract_from_value(&value));
            }
        }

        consumed = line_end + 1;
    }

    carry.drain(0..consumed);
}
