use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use llmrelay_common::RelayMode;
use llmrelay_core::{
    exhausted_failure_body, no_candidates_failure_body, AttemptBody, AttemptSuccess, ProxyError,
    RelayOutcome, RetryContext,
};

/// Headers that describe the hop to the upstream provider rather than the
/// message itself; axum/hyper set their own when building the response to
/// the client, so these are dropped rather than copied through verbatim.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Converts a [`RelayOutcome`] into the client-facing response: the
/// upstream's body passed through byte-for-byte on success, or one of
/// spec.md §6/§7's two structured JSON failure shapes otherwise.
pub fn outcome_to_response(outcome: RelayOutcome, mode: RelayMode) -> Response {
    match outcome {
        RelayOutcome::Success(success) => success_to_response(success),
        RelayOutcome::NoCandidates { skipped } => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(no_candidates_failure_body(skipped))).into_response()
        }
        RelayOutcome::Exhausted(ctx) => exhausted_to_response(&ctx, mode),
    }
}

fn exhausted_to_response(ctx: &RetryContext, mode: RelayMode) -> Response {
    (StatusCode::BAD_GATEWAY, Json(exhausted_failure_body(ctx, mode))).into_response()
}

/// Converts a [`ProxyError`] raised before any upstream attempt (an
/// unroutable path, an unparseable query string) into the client response.
/// `llmrelay-core` stays axum-free; only this crate knows how to turn its
/// `(StatusCode, Bytes)` pair into a [`Response`].
pub fn proxy_error_response(err: ProxyError) -> Response {
    (err.status, err.body).into_response()
}

fn success_to_response(success: AttemptSuccess) -> Response {
    let status = StatusCode::from_u16(success.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);

    if let Some(out_headers) = builder.headers_mut() {
        for (name, value) in &success.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            out_headers.append(name, value);
        }
        if success.is_sse_stream {
            out_headers
                .entry(header::CACHE_CONTROL)
                .or_insert_with(|| HeaderValue::from_static("no-cache"));
            out_headers
                .entry(HeaderName::from_static("x-accel-buffering"))
                .or_insert_with(|| HeaderValue::from_static("no"));
        }
    }

    let body = match success.body {
        AttemptBody::Bytes(bytes) => Body::from(bytes),
        AttemptBody::Stream(rx) => {
            let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            Body::from_stream(stream)
        }
    };

    match builder.body(body) {
        Ok(response) => response,
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed to build upstream response").into_response(),
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}
