//! The three Relay Entry Points of spec.md §2/§4.10. Each handler is thin by
//! design: parse the request into a [`RequestContext`], apply the Tool-Use
//! Repair step where the dialect calls for it, pick a [`DialectTarget`], and
//! hand both to [`RelayEngine::relay`]. Everything else — selection,
//! blacklisting, round robin, retry/failover, upstream forwarding, request
//! logging — lives in `llmrelay-core` and is dialect-agnostic.

mod claude;
mod codex;
mod gemini;
mod response;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use llmrelay_core::RelayEngine;

#[derive(Clone)]
pub struct RelayState {
    pub engine: Arc<RelayEngine>,
}

/// Builds the full HTTP surface: five routes across the three dialects, no
/// admin UI or provider-prefixed multi-tenant routing, since this gateway
/// relays to a single fixed set of providers per dialect rather than
/// brokering per-caller credentials.
pub fn relay_router(engine: Arc<RelayEngine>) -> Router {
    let state = RelayState { engine };
    Router::new()
        .route("/claude/v1/messages", post(claude::messages))
        .route("/claude/v1/models", get(claude::models))
        .route("/codex/v1/chat/completions", post(codex::chat_completions))
        .route("/codex/v1/models", get(codex::models))
        .route("/gemini/v1beta/models/{*model_action}", post(gemini::generate_content))
        .with_state(state)
}
