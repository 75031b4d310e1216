use std::time::Duration;

use llmrelay_common::{GlobalConfig, RelayMode};
use llmrelay_provider_core::{
    selector, BlacklistStore, Kind, Provider, ProviderRegistry, RoundRobinState, ValidationHooks,
};
use llmrelay_storage::StorageBus;
use wreq::Client;

use crate::context::RequestContext;
use crate::retry::{self, OrchestratorOutcome, RetryContext, RetryPolicy};
use crate::upstream::{self, AttemptSuccess, DialectTarget};

/// Everything a Relay Entry Point needs to turn a parsed [`RequestContext`]
/// into an upstream response, so a handler's own body stays limited to
/// HTTP framing (reading the request, picking a [`DialectTarget`],
/// converting the outcome to a response).
pub struct RelayEngine {
    pub registry: ProviderRegistry,
    pub blacklist: BlacklistStore,
    pub round_robin: RoundRobinState,
    pub storage: StorageBus,
    pub client: Client,
    pub global: GlobalConfig,
}

/// What a Relay Entry Point needs to turn into an HTTP response. Building
/// the 502/503 JSON bodies is left to [`retry::exhausted_failure_body`] /
/// [`retry::no_candidates_failure_body`] so every dialect's handler
/// produces byte-identical failure shapes.
pub enum RelayOutcome {
    Success(AttemptSuccess),
    NoCandidates { skipped: usize },
    Exhausted(RetryContext),
}

impl RelayEngine {
    pub fn new(
        providers: Vec<Provider>,
        storage: StorageBus,
        client: Client,
        global: GlobalConfig,
    ) -> Self {
        Self {
            registry: ProviderRegistry::new(providers),
            blacklist: BlacklistStore::new(),
            round_robin: RoundRobinState::new(),
            storage,
            client,
            global,
        }
    }

    /// Selects candidates for `kind`, then runs the Orchestrator against
    /// `target` using `ctx`. Handlers that need the Tool-Use Repair step
    /// must apply it to `ctx.body_bytes` before calling this.
    pub async fn relay(
        &self,
        kind: &Kind,
        ctx: &RequestContext,
        target: &dyn DialectTarget,
    ) -> RelayOutcome {
        let hooks = ValidationHooks::default();
        let snapshot = self.registry.snapshot(kind);
        let selection = selector::select(
            kind,
            ctx.requested_model.as_deref(),
            &snapshot,
            &self.blacklist,
            &self.round_robin,
            &hooks,
        );

        if selection.candidates.is_empty() {
            return RelayOutcome::NoCandidates {
                skipped: selection.skipped,
            };
        }

        let policy = RetryPolicy {
            failure_threshold: self.global.failure_threshold,
            retry_wait: Duration::from_secs(self.global.retry_wait_seconds),
            blacklist_duration: Duration::from_secs(self.global.blacklist_duration_seconds),
            mode: self.global.mode,
        };
        let mut retry_ctx = RetryContext::default();

        let outcome = retry::run(
            &selection.candidates,
            kind.as_str(),
            &policy,
            &self.blacklist,
            &mut retry_ctx,
            |provider| upstream::attempt(&self.client, provider, ctx, target, &self.storage),
        )
        .await;

        match outcome {
            OrchestratorOutcome::Success(success) => RelayOutcome::Success(success),
            OrchestratorOutcome::Exhausted => RelayOutcome::Exhausted(retry_ctx),
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.global.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;
    use llmrelay_storage::{SeaOrmStorage, StorageBusConfig};

    struct UnreachableTarget;

    impl DialectTarget for UnreachableTarget {
        fn method(&self) -> crate::upstream::HttpVerb {
            crate::upstream::HttpVerb::Post
        }

        fn target_url(&self, provider: &Provider) -> String {
            format!("{}/v1/messages", provider.upstream_url)
        }

        fn auth_headers(&self, _provider: &Provider) -> Vec<(String, String)> {
            Vec::new()
        }

        fn default_timeout(&self, _is_stream: bool) -> Duration {
            Duration::from_millis(50)
        }

        fn platform(&self) -> &str {
            "claude"
        }
    }

    async fn memory_storage() -> StorageBus {
        let storage = SeaOrmStorage::connect("sqlite::memory:").await.unwrap();
        storage.sync().await.unwrap();
        StorageBus::spawn(storage, StorageBusConfig::default())
    }

    #[tokio::test]
    async fn empty_registry_yields_no_candidates() {
        let storage = memory_storage().await;
        let engine = RelayEngine::new(
            Vec::new(),
            storage,
            upstream::build_client().unwrap(),
            GlobalConfig::default(),
        );
        let ctx = RequestContext::extract(Bytes::new(), HeaderMap::new(), None);
        let outcome = engine.relay(&Kind::Claude, &ctx, &UnreachableTarget).await;
        assert!(matches!(outcome, RelayOutcome::NoCandidates { skipped: 0 }));
    }

    #[tokio::test]
    async fn unreachable_provider_exhausts_after_threshold() {
        let storage = memory_storage().await;
        let mut global = GlobalConfig::default();
        global.failure_threshold = 1;
        global.retry_wait_seconds = 0;
        let provider = Provider {
            name: "a".to_string(),
            kind: Kind::Claude,
            upstream_url: "http://127.0.0.1:0".to_string(),
            credential: "secret".to_string(),
            level: 1,
            enabled: true,
            model_allowlist: Vec::new(),
            per_provider_timeout: None,
        };
        let engine = RelayEngine::new(
            vec![provider],
            storage,
            upstream::build_client().unwrap(),
            global,
        );
        let ctx = RequestContext::extract(Bytes::new(), HeaderMap::new(), None);
        let outcome = engine.relay(&Kind::Claude, &ctx, &UnreachableTarget).await;
        assert!(matches!(outcome, RelayOutcome::Exhausted(_)));
    }
}
