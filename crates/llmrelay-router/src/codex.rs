use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use tracing::Instrument;

use llmrelay_core::dialects::{CodexChatCompletions, CodexModels};
use llmrelay_core::RequestContext;
use llmrelay_provider_core::Kind;

use crate::response::outcome_to_response;
use crate::RelayState;

/// `POST /codex/v1/chat/completions`. No Tool-Use Repair: the failure mode
/// it guards against is specific to the claude message-block shape.
pub async fn chat_completions(
    State(state): State<RelayState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = llmrelay_common::new_trace_id();
    let span = tracing::info_span!("relay_request", trace_id = %trace_id, dialect = "codex", path = "/codex/v1/chat/completions");
    async move {
        let ctx = RequestContext::extract(body, headers, query.as_deref());
        tracing::info!(stream = ctx.is_stream, "request received");
        let outcome = state.engine.relay(&Kind::Codex, &ctx, &CodexChatCompletions).await;
        outcome_to_response(outcome, state.engine.mode())
    }
    .instrument(span)
    .await
}

/// `GET /codex/v1/models`.
pub async fn models(State(state): State<RelayState>, RawQuery(query): RawQuery, headers: HeaderMap) -> Response {
    let trace_id = llmrelay_common::new_trace_id();
    let span = tracing::info_span!("relay_request", trace_id = %trace_id, dialect = "codex", path = "/codex/v1/models");
    async move {
        let ctx = RequestContext::extract(Bytes::new(), headers, query.as_deref());
        tracing::info!(stream = ctx.is_stream, "request received");
        let outcome = state.engine.relay(&Kind::Codex, &ctx, &CodexModels).await;
        outcome_to_response(outcome, state.engine.mode())
    }
    .instrument(span)
    .await
}
