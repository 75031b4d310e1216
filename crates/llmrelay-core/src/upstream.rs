use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use http::HeaderMap;
use llmrelay_provider_core::Provider;
use llmrelay_storage::{RequestLogEntry, StorageBus};
use wreq::Client;

use crate::context::RequestContext;
use crate::usage::{accumulate_sse_chunk, extract_from_value, TokenUsage};

/// Headers that are connection-scoped rather than message-scoped and must
/// never be forwarded verbatim to the upstream.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub enum HttpVerb {
    Get,
    Post,
}

/// A successful attempt's body: either fully read (non-streaming) or a
/// channel the caller drains as chunks arrive from upstream.
pub enum AttemptBody {
    Bytes(Bytes),
    Stream(tokio::sync::mpsc::Receiver<Bytes>),
}

/// Dialect-specific outbound construction: URL (path + model substitution)
/// and credential injection. One implementation per dialect lives in the
/// Relay Entry Point that owns it; the Forwarder only calls through this
/// trait, so the attempt loop stays generic across dialects.
pub trait DialectTarget: Send + Sync {
    fn method(&self) -> HttpVerb;
    fn target_url(&self, provider: &Provider) -> String;
    fn auth_headers(&self, provider: &Provider) -> Vec<(String, String)>;
    fn default_timeout(&self, is_stream: bool) -> Duration;
    fn platform(&self) -> &str;
}

#[derive(Debug)]
pub struct AttemptFailure {
    pub retryable: bool,
    pub status: Option<u16>,
    pub message: String,
}

pub struct AttemptSuccess {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: AttemptBody,
    pub is_sse_stream: bool,
}

/// Executes one Forwarder attempt against `provider`. On return, exactly
/// one `request_log` row has been enqueued, success or failure.
pub async fn attempt(
    client: &Client,
    provider: &Provider,
    ctx: &RequestContext,
    target: &dyn DialectTarget,
    storage: &StorageBus,
) -> Result<AttemptSuccess, AttemptFailure> {
    let started = Instant::now();
    let timeout = provider
        .per_provider_timeout
        .unwrap_or_else(|| target.default_timeout(ctx.is_stream));

    let url = target.target_url(provider);
    let method = match target.method() {
        HttpVerb::Get => wreq::Method::GET,
        HttpVerb::Post => wreq::Method::POST,
    };

    let mut builder = client.request(method, &url).timeout(timeout);
    builder = apply_forwarded_headers(builder, &ctx.client_headers);
    for (name, value) in target.auth_headers(provider) {
        builder = builder.header(name, value);
    }
    if matches!(target.method(), HttpVerb::Post) {
        builder = builder.body(ctx.body_bytes.clone());
    }

    let result = builder.send().await;
    let duration_sec = started.elapsed().as_secs_f64();

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            let failure = classify_transport_error(&err);
            log_attempt(
                storage,
                target,
                provider,
                ctx,
                0,
                TokenUsage::default(),
                duration_sec,
            )
            .await;
            return Err(failure);
        }
    };

    let status = response.status().as_u16();
    let headers = headers_to_vec(response.headers());
    let is_sse_stream = ctx.is_stream
        && headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.contains("text/event-stream"));

    if !(200..300).contains(&status) {
        let body = response.bytes().await.unwrap_or_default();
        let message = String::from_utf8_lossy(&body.slice(0..body.len().min(2048))).to_string();
        log_attempt(
            storage,
            target,
            provider,
            ctx,
            status as i32,
            TokenUsage::default(),
            duration_sec,
        )
        .await;
        return Err(AttemptFailure {
            retryable: status_is_retryable(status),
            status: Some(status),
            message,
        });
    }

    if is_sse_stream {
        // Flush each chunk to the client as it arrives rather than
        // buffering the whole body: this is a long-lived completion and
        // the client is waiting on early tokens, not the final byte.
        // The request_log row is still enqueued exactly once, just from
        // inside the task draining the stream instead of before this
        // function returns control to the Orchestrator.
        let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(32);
        let storage = storage.clone();
        let platform = target.platform().to_string();
        let provider_name = provider.name.clone();
        let requested_model = ctx.requested_model.clone();
        let is_stream = ctx.is_stream;
        tokio::spawn(async move {
            let mut usage = TokenUsage::default();
            let mut carry = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                accumulate_sse_chunk(&mut usage, &chunk, &mut carry);
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            storage
                .enqueue(RequestLogEntry {
                    platform,
                    model: requested_model,
                    provider: provider_name,
                    http_code: status as i32,
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    cache_create_tokens: usage.cache_create_tokens,
                    cache_read_tokens: usage.cache_read_tokens,
                    reasoning_tokens: usage.reasoning_tokens,
                    is_stream,
                    duration_sec,
                })
                .await;
        });
        return Ok(AttemptSuccess {
            status,
            headers,
            body: AttemptBody::Stream(rx),
            is_sse_stream: true,
        });
    }

    let body = response.bytes().await.unwrap_or_default();
    let usage = serde_json::from_slice::<serde_json::Value>(&body)
        .map(|v| extract_from_value(&v))
        .unwrap_or_default();
    log_attempt(storage, target, provider, ctx, status as i32, usage, duration_sec).await;
    Ok(AttemptSuccess {
        status,
        headers,
        body: AttemptBody::Bytes(body),
        is_sse_stream: false,
    })
}

async fn log_attempt(
    storage: &StorageBus,
    target: &dyn DialectTarget,
    provider: &Provider,
    ctx: &RequestContext,
    http_code: i32,
    usage: TokenUsage,
    duration_sec: f64,
) {
    storage
        .enqueue(RequestLogEntry {
            platform: target.platform().to_string(),
            model: ctx.requested_model.clone(),
            provider: provider.name.clone(),
            http_code,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_create_tokens: usage.cache_create_tokens,
            cache_read_tokens: usage.cache_read_tokens,
            reasoning_tokens: usage.reasoning_tokens,
            is_stream: ctx.is_stream,
            duration_sec,
        })
        .await;
}

fn apply_forwarded_headers(
    mut builder: wreq::RequestBuilder,
    client_headers: &HeaderMap,
) -> wreq::RequestBuilder {
    for (name, value) in client_headers {
        if HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h)) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    builder
}

fn headers_to_vec(map: &wreq::header::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

/// 429 and 5xx are retryable; the hard-rejection codes below advance to
/// the next provider without grinding the current one through its full
/// failure threshold.
fn status_is_retryable(status: u16) -> bool {
    match status {
        400 | 401 | 403 | 404 | 413 => false,
        _ => true,
    }
}

fn classify_transport_error(err: &wreq::Error) -> AttemptFailure {
    AttemptFailure {
        retryable: true,
        status: None,
        message: err.to_string(),
    }
}

pub fn build_client() -> Result<Client, wreq::Error> {
    Client::builder().build()
}
