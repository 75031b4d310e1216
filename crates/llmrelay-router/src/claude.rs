use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use tracing::Instrument;

use llmrelay_core::dialects::{ClaudeMessages, ClaudeModels};
use llmrelay_core::{repair_tool_use, RequestContext};
use llmrelay_provider_core::Kind;

use crate::response::outcome_to_response;
use crate::RelayState;

/// `POST /claude/v1/messages`. Tool-Use Repair runs before selection so a
/// mid-conversation failover never hands a provider a dangling `tool_use`
/// block.
pub async fn messages(
    State(state): State<RelayState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = llmrelay_common::new_trace_id();
    let span = tracing::info_span!("relay_request", trace_id = %trace_id, dialect = "claude", path = "/claude/v1/messages");
    async move {
        let repaired = repair_tool_use(body);
        if repaired.repaired {
            tracing::info!("tool-use repair synthesized a tool_result turn");
        }
        let ctx = RequestContext::extract(repaired.body, headers, query.as_deref());
        tracing::info!(stream = ctx.is_stream, "request received");
        let outcome = state.engine.relay(&Kind::Claude, &ctx, &ClaudeMessages).await;
        outcome_to_response(outcome, state.engine.mode())
    }
    .instrument(span)
    .await
}

/// `GET /claude/v1/models`.
pub async fn models(State(state): State<RelayState>, RawQuery(query): RawQuery, headers: HeaderMap) -> Response {
    let trace_id = llmrelay_common::new_trace_id();
    let span = tracing::info_span!("relay_request", trace_id = %trace_id, dialect = "claude", path = "/claude/v1/models");
    async move {
        let ctx = RequestContext::extract(Bytes::new(), headers, query.as_deref());
        tracing::info!(stream = ctx.is_stream, "request received");
        let outcome = state.engine.relay(&Kind::Claude, &ctx, &ClaudeModels).await;
        outcome_to_response(outcome, state.engine.mode())
    }
    .instrument(span)
    .await
}
