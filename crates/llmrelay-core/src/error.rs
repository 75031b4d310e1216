use bytes::Bytes;
use http::StatusCode;

/// Failures from loading and validating the on-disk/CLI/env configuration,
/// surfaced before the server ever starts listening.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid relay mode {0:?}, expected \"blacklist\" or \"fallback\"")]
    InvalidMode(String),
    #[error("provider {name:?} of kind {kind} is enabled but missing a required url/credential")]
    InvalidProvider { kind: String, name: String },
}

/// An error surfaced directly to the client before the Orchestrator ever
/// runs — an unroutable gemini `{model}:{action}` path is the only case
/// today, since axum's declarative routing already rejects unknown routes
/// and wrong methods on its own.
#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProxyError {
    pub fn bad_request(message: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: message.into(),
        }
    }

    pub fn not_found(message: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: message.into(),
        }
    }
}
