use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;

/// Parsed once per inbound request. `http::HeaderMap` is already
/// case-insensitive on lookup, so `client_headers` doubles as the stored
/// copy of the client's headers without any extra wrapper type.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub body_bytes: Bytes,
    pub is_stream: bool,
    pub requested_model: Option<String>,
    pub query: Vec<(String, String)>,
    pub client_headers: HeaderMap,
}

impl RequestContext {
    /// `body_bytes` is assumed already read off the wire; this never fails
    /// on malformed JSON — it just falls back to the documented defaults,
    /// since a non-JSON or missing body is expected for e.g. `GET` model
    /// listing endpoints and is not itself an `InvalidRequest`.
    pub fn extract(body_bytes: Bytes, client_headers: HeaderMap, raw_query: Option<&str>) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(&body_bytes).ok();

        let is_stream = parsed
            .as_ref()
            .and_then(|v| v.get("stream"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let requested_model = parsed
            .as_ref()
            .and_then(|v| v.get("model"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            body_bytes,
            is_stream,
            requested_model,
            query: flatten_query(raw_query),
            client_headers,
        }
    }
}

/// Multi-valued keys become one comma-joined value, preserving first-seen
/// key order.
fn flatten_query(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut values: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let key = key.into_owned();
        if !values.contains_key(&key) {
            order.push(key.clone());
        }
        values.entry(key).or_default().push(value.into_owned());
    }

    order
        .into_iter()
        .map(|key| {
            let joined = values.remove(&key).unwrap_or_default().join(",");
            (key, joined)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_stream_and_model_with_defaults() {
        let ctx = RequestContext::extract(
            Bytes::from_static(br#"{"model":"claude-3-opus","stream":true}"#),
            HeaderMap::new(),
            None,
        );
        assert!(ctx.is_stream);
        assert_eq!(ctx.requested_model.as_deref(), Some("claude-3-opus"));
    }

    #[test]
    fn missing_fields_default_to_false_and_none() {
        let ctx = RequestContext::extract(Bytes::from_static(b"{}"), HeaderMap::new(), None);
        assert!(!ctx.is_stream);
        assert_eq!(ctx.requested_model, None);
    }

    #[test]
    fn non_json_body_does_not_fail_extraction() {
        let ctx = RequestContext::extract(Bytes::new(), HeaderMap::new(), None);
        assert!(!ctx.is_stream);
    }

    #[test]
    fn multi_valued_query_keys_are_comma_joined_in_first_seen_order() {
        let ctx = RequestContext::extract(
            Bytes::new(),
            HeaderMap::new(),
            Some("b=2&a=1&b=3"),
        );
        assert_eq!(
            ctx.query,
            vec![("b".to_string(), "2,3".to_string()), ("a".to_string(), "1".to_string())]
        );
    }
}
