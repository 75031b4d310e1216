use serde::{Deserialize, Serialize};

/// A fresh per-request trace id, attached to the `tracing` span each Relay
/// Entry Point opens so every `info!`/`warn!` emitted while handling that
/// request — selection, retries, the upstream attempt — carries the same
/// `trace_id` field without threading it through every call explicitly.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Retry/failover policy shared by every dialect's Retry Orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Retry the same provider up to `failure_threshold` times before it is
    /// blacklisted and the orchestrator advances to the next candidate.
    Blacklist,
    /// Advance to the next candidate on the first failure; blacklisting
    /// still accrues across requests via the shared failure counter.
    Fallback,
}

impl Default for RelayMode {
    fn default() -> Self {
        RelayMode::Fallback
    }
}

/// Final, merged global configuration used by the running process.
///
/// Merge order: CLI > ENV > config file. Unlike the teacher's global config,
/// there is no admin-editable database copy to merge in or persist back to:
/// provider configuration editing is out of scope for this gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub listen_addr: String,
    pub failure_threshold: u32,
    pub retry_wait_seconds: u64,
    pub mode: RelayMode,
    /// How long a provider stays blacklisted once `failure_threshold`
    /// consecutive retryable failures trip it. A caller-supplied policy
    /// input per spec.md §4.2 — not owned by the Blacklist Store itself.
    pub blacklist_duration_seconds: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:18100".to_string(),
            failure_threshold: 3,
            retry_wait_seconds: 0,
            mode: RelayMode::Fallback,
            blacklist_duration_seconds: 60,
        }
    }
}

/// Optional layer used for merging CLI/env overrides onto a file-loaded config.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfigPatch {
    pub listen_addr: Option<String>,
    pub failure_threshold: Option<u32>,
    pub retry_wait_seconds: Option<u64>,
    pub mode: Option<RelayMode>,
    pub blacklist_duration_seconds: Option<u64>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.listen_addr.is_some() {
            self.listen_addr = other.listen_addr;
        }
        if other.failure_threshold.is_some() {
            self.failure_threshold = other.failure_threshold;
        }
        if other.retry_wait_seconds.is_some() {
            self.retry_wait_seconds = other.retry_wait_seconds;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.blacklist_duration_seconds.is_some() {
            self.blacklist_duration_seconds = other.blacklist_duration_seconds;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let failure_threshold = self.failure_threshold.unwrap_or(3);
        if failure_threshold == 0 {
            return Err(GlobalConfigError::InvalidValue {
                field: "failure_threshold",
                message: "must be >= 1".to_string(),
            });
        }
        Ok(GlobalConfig {
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| "127.0.0.1:18100".to_string()),
            failure_threshold,
            retry_wait_seconds: self.retry_wait_seconds.unwrap_or(0),
            mode: self.mode.unwrap_or_default(),
            blacklist_duration_seconds: self.blacklist_duration_seconds.unwrap_or(60),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            listen_addr: Some(value.listen_addr),
            failure_threshold: Some(value.failure_threshold),
            retry_wait_seconds: Some(value.retry_wait_seconds),
            mode: Some(value.mode),
            blacklist_duration_seconds: Some(value.blacklist_duration_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }

    #[test]
    fn patch_overlay_prefers_later_values() {
        let mut base = GlobalConfigPatch {
            listen_addr: Some("0.0.0.0:8080".to_string()),
            failure_threshold: Some(3),
            retry_wait_seconds: Some(1),
            mode: Some(RelayMode::Fallback),
            blacklist_duration_seconds: Some(60),
        };
        base.overlay(GlobalConfigPatch {
            listen_addr: None,
            failure_threshold: Some(5),
            retry_wait_seconds: None,
            mode: Some(RelayMode::Blacklist),
            blacklist_duration_seconds: None,
        });
        assert_eq!(base.listen_addr.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(base.failure_threshold, Some(5));
        assert_eq!(base.mode, Some(RelayMode::Blacklist));
    }

    #[test]
    fn zero_failure_threshold_rejected() {
        let patch = GlobalConfigPatch {
            failure_threshold: Some(0),
            ..Default::default()
        };
        assert!(patch.into_config().is_err());
    }
}
