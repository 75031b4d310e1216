use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::provider::{Kind, Provider};

/// Read-only snapshot of configured providers, swapped atomically on reload.
///
/// The Selector always wants "every provider for a kind" so it can filter
/// and rank a pool, so the snapshot granularity is per-kind rather than
/// per-name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: ArcSwap<Vec<Provider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers: ArcSwap::from_pointee(providers),
        }
    }

    /// Replaces the whole provider set. Readers already holding a snapshot
    /// from [`ProviderRegistry::snapshot`] are unaffected.
    pub fn reload(&self, providers: Vec<Provider>) {
        self.providers.store(Arc::new(providers));
    }

    /// Stable, owned copy of every provider of `kind`, with `level`
    /// normalized to its effective value.
    pub fn snapshot(&self, kind: &Kind) -> Vec<Provider> {
        self.providers
            .load()
            .iter()
            .filter(|p| &p.kind == kind)
            .cloned()
            .map(|mut p| {
                p.level = p.effective_level() as i64;
                p
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, kind: Kind, level: i64) -> Provider {
        Provider {
            name: name.to_string(),
            kind,
            upstream_url: "https://example.test".to_string(),
            credential: "secret".to_string(),
            level,
            enabled: true,
            model_allowlist: Vec::new(),
            per_provider_timeout: None,
        }
    }

    #[test]
    fn snapshot_filters_by_kind_and_normalizes_level() {
        let registry = ProviderRegistry::new(vec![
            provider("a", Kind::Claude, 0),
            provider("b", Kind::Codex, 1),
        ]);
        let claude = registry.snapshot(&Kind::Claude);
        assert_eq!(claude.len(), 1);
        assert_eq!(claude[0].name, "a");
        assert_eq!(claude[0].level, 1);
    }

    #[test]
    fn reload_replaces_snapshot_for_new_readers() {
        let registry = ProviderRegistry::new(vec![provider("a", Kind::Claude, 1)]);
        registry.reload(vec![provider("a", Kind::Claude, 1), provider("b", Kind::Claude, 2)]);
        assert_eq!(registry.snapshot(&Kind::Claude).len(), 2);
    }
}
