use std::time::Duration;

use llmrelay_common::RelayMode;
use llmrelay_provider_core::{BlacklistStore, Provider};

use crate::upstream::{AttemptFailure, AttemptSuccess};

/// Per-request retry/failover bookkeeping.
#[derive(Debug, Default)]
pub struct RetryContext {
    pub total_attempts: u32,
    pub last_error: Option<String>,
    pub last_provider: Option<String>,
    pub last_duration: Duration,
}

/// `failure_threshold`/`retry_wait`/`blacklist_duration` are policy inputs,
/// not store-owned, so a single [`RetryPolicy`] carries them alongside the
/// mode that decides how many times a candidate is retried before advancing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub failure_threshold: u32,
    pub retry_wait: Duration,
    pub blacklist_duration: Duration,
    pub mode: RelayMode,
}

impl RetryPolicy {
    /// In `fallback` mode the effective per-provider attempt bound is 1:
    /// advance to the next candidate on the first failure. The blacklist
    /// still accrues against the caller-supplied `failure_threshold` so
    /// repeated fallback failures eventually blacklist a provider across
    /// requests even though no single request retries it.
    fn attempts_per_candidate(&self) -> u32 {
        match self.mode {
            RelayMode::Blacklist => self.failure_threshold,
            RelayMode::Fallback => 1,
        }
    }
}

pub enum OrchestratorOutcome {
    Success(AttemptSuccess),
    Exhausted,
}

/// Runs the Orchestrator loop over `candidates`, invoking
/// `forward_once` for each attempt. `forward_once` must itself record the
/// request-log row; this function only updates [`RetryContext`] and talks
/// to the Blacklist Store.
pub async fn run<F, Fut>(
    candidates: &[Provider],
    kind: &str,
    policy: &RetryPolicy,
    blacklist: &BlacklistStore,
    ctx: &mut RetryContext,
    mut forward_once: F,
) -> OrchestratorOutcome
where
    F: FnMut(&Provider) -> Fut,
    Fut: std::future::Future<Output = Result<AttemptSuccess, AttemptFailure>>,
{
    let per_candidate_attempts = policy.attempts_per_candidate();

    for provider in candidates {
        for _ in 0..per_candidate_attempts {
            ctx.total_attempts += 1;
            ctx.last_provider = Some(provider.name.clone());

            match forward_once(provider).await {
                Ok(success) => {
                    blacklist.record_success(kind, &provider.name);
                    tracing::info!(
                        provider = %provider.name,
                        kind,
                        attempt = ctx.total_attempts,
                        status = success.status,
                        "upstream attempt succeeded"
                    );
                    return OrchestratorOutcome::Success(success);
                }
                Err(failure) => {
                    ctx.last_error = Some(failure.message.clone());
                    tracing::warn!(
                        provider = %provider.name,
                        kind,
                        attempt = ctx.total_attempts,
                        status = failure.status,
                        retryable = failure.retryable,
                        error = %failure.message,
                        "upstream attempt failed"
                    );

                    // Non-retryable statuses (400/401/403/404/413) still count once
                    // against the failure counter, but the immediate break below
                    // means a single request can never drive that counter past 1.
                    blacklist.record_failure(
                        kind,
                        &provider.name,
                        policy.failure_threshold,
                        policy.blacklist_duration,
                    );

                    if !failure.retryable {
                        break;
                    }

                    let (blacklisted, _) = blacklist.check(kind, &provider.name);
                    if blacklisted {
                        break;
                    }

                    if policy.retry_wait > Duration::ZERO {
                        tokio::time::sleep(policy.retry_wait).await;
                    }
                }
            }
        }
    }

    tracing::warn!(
        kind,
        total_attempts = ctx.total_attempts,
        last_provider = ctx.last_provider.as_deref().unwrap_or(""),
        "all candidates exhausted"
    );
    OrchestratorOutcome::Exhausted
}

/// Builds the HTTP 502 failure body of spec.md §6, surfaced once the
/// Orchestrator has exhausted every candidate.
pub fn exhausted_failure_body(ctx: &RetryContext, mode: RelayMode) -> serde_json::Value {
    let last_provider = ctx.last_provider.as_deref().unwrap_or("<none>");
    let last_error = ctx.last_error.as_deref().unwrap_or("<unknown>");
    let mut body = serde_json::json!({
        "error": format!("所有 Provider 都失败，最后尝试: {last_provider} - {last_error}"),
        "lastProvider": ctx.last_provider,
        "totalAttempts": ctx.total_attempts,
    });
    if mode == RelayMode::Blacklist {
        body["mode"] = serde_json::Value::String("blacklist_retry".to_string());
    }
    body
}

/// Builds the HTTP 503 body for spec.md §7's `NoCandidates` case: the
/// filter pipeline left nothing to attempt before any upstream call was made.
pub fn no_candidates_failure_body(skipped: usize) -> serde_json::Value {
    serde_json::json!({
        "error": "no eligible provider for this request",
        "totalAttempts": 0,
        "skipped": skipped,
    })
}
