use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use tracing::Instrument;

use llmrelay_core::dialects::GeminiGenerateContent;
use llmrelay_core::{ProxyError, RequestContext};
use llmrelay_provider_core::Kind;

use crate::response::{outcome_to_response, proxy_error_response};
use crate::RelayState;

/// `POST /gemini/v1beta/models/{model}:generateContent` or
/// `{model}:streamGenerateContent`, matching the upstream Gemini REST
/// surface's colon-separated action suffix rather than a query parameter.
pub async fn generate_content(
    State(state): State<RelayState>,
    Path(model_action): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = llmrelay_common::new_trace_id();
    let span = tracing::info_span!("relay_request", trace_id = %trace_id, dialect = "gemini", path = %model_action);
    async move {
        let Some((model, action)) = split_model_action(&model_action) else {
            return proxy_error_response(ProxyError::bad_request(
                "expected path of the form {model}:{action}",
            ));
        };

        let is_stream = match action {
            "generateContent" => false,
            "streamGenerateContent" => true,
            _ => {
                return proxy_error_response(ProxyError::not_found(format!(
                    "unsupported gemini action {action:?}"
                )))
            }
        };

        let mut ctx = RequestContext::extract(body, headers, query.as_deref());
        // Gemini request bodies carry no `stream` field; the signal lives in
        // the URL's `:generateContent`/`:streamGenerateContent` suffix, so it
        // overrides whatever the body-based default produced.
        ctx.is_stream = is_stream;
        tracing::info!(stream = ctx.is_stream, "request received");
        let target = GeminiGenerateContent {
            model: model.to_string(),
            is_stream,
        };
        let outcome = state.engine.relay(&Kind::Gemini, &ctx, &target).await;
        outcome_to_response(outcome, state.engine.mode())
    }
    .instrument(span)
    .await
}

/// Splits `gemini-1.5-pro:streamGenerateContent` into its model and action
/// halves. The model name itself never contains a colon, so the last one in
/// the path wins.
fn split_model_action(raw: &str) -> Option<(&str, &str)> {
    raw.rsplit_once(':')
        .filter(|(model, action)| !model.is_empty() && !action.is_empty())
}
