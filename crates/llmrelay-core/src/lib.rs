pub mod config;
pub mod context;
pub mod dialects;
pub mod engine;
pub mod error;
pub mod repair;
pub mod retry;
pub mod upstream;
pub mod usage;

pub use config::{load, CliArgs, LoadedConfig};
pub use context::RequestContext;
pub use engine::{RelayEngine, RelayOutcome};
pub use error::{ConfigError, ProxyError};
pub use repair::{repair_tool_use, RepairOutcome};
pub use retry::{exhausted_failure_body, no_candidates_failure_body, RetryContext, RetryPolicy};
pub use upstream::{
    attempt, build_client, AttemptBody, AttemptFailure, AttemptSuccess, DialectTarget, HttpVerb,
};
pub use usage::TokenUsage;
