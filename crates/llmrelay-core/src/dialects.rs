use std::time::Duration;

use llmrelay_provider_core::Provider;

use crate::upstream::{DialectTarget, HttpVerb};

/// 32 hours: long-lived streaming completions are expected to run for a
/// very long time before the client gives up on its own. Documented in
/// spec.md §9 as intentional, not a guard to shorten casually.
const CLAUDE_CODEX_DEFAULT_TIMEOUT: Duration = Duration::from_secs(32 * 60 * 60);
const GEMINI_DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const MODELS_LIST_TIMEOUT: Duration = Duration::from_secs(30);

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `POST /claude/v1/messages`.
pub struct ClaudeMessages;

impl DialectTarget for ClaudeMessages {
    fn method(&self) -> HttpVerb {
        HttpVerb::Post
    }

    fn target_url(&self, provider: &Provider) -> String {
        format!("{}/v1/messages", provider.upstream_url.trim_end_matches('/'))
    }

    fn auth_headers(&self, provider: &Provider) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), provider.credential.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn default_timeout(&self, _is_stream: bool) -> Duration {
        CLAUDE_CODEX_DEFAULT_TIMEOUT
    }

    fn platform(&self) -> &str {
        "claude"
    }
}

/// `GET /claude/v1/models`.
pub struct ClaudeModels;

impl DialectTarget for ClaudeModels {
    fn method(&self) -> HttpVerb {
        HttpVerb::Get
    }

    fn target_url(&self, provider: &Provider) -> String {
        format!("{}/v1/models", provider.upstream_url.trim_end_matches('/'))
    }

    fn auth_headers(&self, provider: &Provider) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), provider.credential.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn default_timeout(&self, _is_stream: bool) -> Duration {
        MODELS_LIST_TIMEOUT
    }

    fn platform(&self) -> &str {
        "claude"
    }
}

/// `POST /codex/v1/chat/completions`.
pub struct CodexChatCompletions;

impl DialectTarget for CodexChatCompletions {
    fn method(&self) -> HttpVerb {
        HttpVerb::Post
    }

    fn target_url(&self, provider: &Provider) -> String {
        format!(
            "{}/v1/chat/completions",
            provider.upstream_url.trim_end_matches('/')
        )
    }

    fn auth_headers(&self, provider: &Provider) -> Vec<(String, String)> {
        vec![("authorization".to_string(), format!("Bearer {}", provider.credential))]
    }

    fn default_timeout(&self, _is_stream: bool) -> Duration {
        CLAUDE_CODEX_DEFAULT_TIMEOUT
    }

    fn platform(&self) -> &str {
        "codex"
    }
}

/// `GET /codex/v1/models`.
pub struct CodexModels;

impl DialectTarget for CodexModels {
    fn method(&self) -> HttpVerb {
        HttpVerb::Get
    }

    fn target_url(&self, provider: &Provider) -> String {
        format!("{}/v1/models", provider.upstream_url.trim_end_matches('/'))
    }

    fn auth_headers(&self, provider: &Provider) -> Vec<(String, String)> {
        vec![("authorization".to_string(), format!("Bearer {}", provider.credential))]
    }

    fn default_timeout(&self, _is_stream: bool) -> Duration {
        MODELS_LIST_TIMEOUT
    }

    fn platform(&self) -> &str {
        "codex"
    }
}

/// `POST /gemini/v1beta/models/{model}:generateContent|:streamGenerateContent`.
///
/// The credential is embedded in the URL as `key=...`, matching the
/// AI-Studio-facing Gemini REST surface; a provider whose credential is
/// itself a bearer token can still be proxied through an upstream that
/// accepts the same query parameter, since nothing else in the data model
/// distinguishes the two credential shapes.
pub struct GeminiGenerateContent {
    pub model: String,
    pub is_stream: bool,
}

impl DialectTarget for GeminiGenerateContent {
    fn method(&self) -> HttpVerb {
        HttpVerb::Post
    }

    fn target_url(&self, provider: &Provider) -> String {
        let op = if self.is_stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        let base = provider.upstream_url.trim_end_matches('/');
        let separator = if op.contains('?') { "&" } else { "?" };
        format!(
            "{base}/v1beta/models/{}:{op}{separator}key={}",
            self.model, provider.credential
        )
    }

    fn auth_headers(&self, _provider: &Provider) -> Vec<(String, String)> {
        Vec::new()
    }

    fn default_timeout(&self, _is_stream: bool) -> Duration {
        GEMINI_DEFAULT_TIMEOUT
    }

    fn platform(&self) -> &str {
        "gemini"
    }
}
