use crate::blacklist::BlacklistStore;
use crate::provider::{Kind, Provider};
use crate::round_robin::RoundRobinState;

/// Optional pluggable validation steps beyond the built-in checks. Both
/// default to "always admit" when absent, matching §4.6's "(if configured)"
/// wording — most deployments need nothing beyond the allowlist check
/// already carried on [`Provider`].
#[derive(Default)]
pub struct ValidationHooks<'a> {
    pub config_validator: Option<&'a dyn Fn(&Provider) -> bool>,
}

pub struct SelectionResult {
    pub candidates: Vec<Provider>,
    pub skipped: usize,
}

/// Implements §4.6: filter, group by level, reorder within level, flatten.
pub fn select(
    kind: &Kind,
    requested_model: Option<&str>,
    registry_snapshot: &[Provider],
    blacklist: &BlacklistStore,
    round_robin: &RoundRobinState,
    hooks: &ValidationHooks<'_>,
) -> SelectionResult {
    // Gemini only runs steps 1 and 4; the model-support and config-validator
    // hooks are not wired for that dialect.
    let reduced_filter = matches!(kind, Kind::Gemini);

    let mut skipped = 0usize;
    let mut survivors: Vec<Provider> = Vec::new();

    for p in registry_snapshot {
        if !(p.enabled && p.has_valid_config()) {
            skipped += 1;
            continue;
        }

        if !reduced_filter {
            if let Some(validator) = hooks.config_validator {
                if !validator(p) {
                    skipped += 1;
                    continue;
                }
            }

            if let Some(model) = requested_model {
                if !model.is_empty() && !p.admits_model(model) {
                    skipped += 1;
                    continue;
                }
            }
        }

        let (blacklisted, _) = blacklist.check(kind.as_str(), &p.name);
        if blacklisted {
            skipped += 1;
            continue;
        }

        survivors.push(p.clone());
    }

    let mut levels: Vec<u32> = survivors.iter().map(Provider::effective_level).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut candidates = Vec::with_capacity(survivors.len());
    for level in levels {
        let group: Vec<Provider> = survivors
            .iter()
            .filter(|p| p.effective_level() == level)
            .cloned()
            .collect();
        candidates.extend(round_robin.reorder(kind.as_str(), level, group));
    }

    SelectionResult { candidates, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn provider(name: &str, level: i64) -> Provider {
        Provider {
            name: name.to_string(),
            kind: Kind::Claude,
            upstream_url: "https://example.test".to_string(),
            credential: "secret".to_string(),
            level,
            enabled: true,
            model_allowlist: Vec::new(),
            per_provider_timeout: None,
        }
    }

    fn names(result: &SelectionResult) -> Vec<&str> {
        result.candidates.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn level_priority_always_places_higher_numbered_level_last() {
        let blacklist = BlacklistStore::new();
        let round_robin = RoundRobinState::new();
        let hooks = ValidationHooks::default();
        let registry = vec![provider("A", 1), provider("B", 1), provider("C", 2)];

        let result = select(&Kind::Claude, None, &registry, &blacklist, &round_robin, &hooks);
        assert_eq!(result.candidates.last().unwrap().name, "C");
        assert_eq!(result.candidates.len(), 3);
    }

    #[test]
    fn blacklisted_provider_is_skipped() {
        let blacklist = BlacklistStore::new();
        let round_robin = RoundRobinState::new();
        let hooks = ValidationHooks::default();
        blacklist.record_failure("claude", "A", 1, Duration::from_secs(60));
        let registry = vec![provider("A", 1), provider("B", 1)];

        let result = select(&Kind::Claude, None, &registry, &blacklist, &round_robin, &hooks);
        assert_eq!(names(&result), vec!["B"]);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn disabled_provider_is_skipped() {
        let blacklist = BlacklistStore::new();
        let round_robin = RoundRobinState::new();
        let hooks = ValidationHooks::default();
        let mut disabled = provider("A", 1);
        disabled.enabled = false;
        let registry = vec![disabled, provider("B", 1)];

        let result = select(&Kind::Claude, None, &registry, &blacklist, &round_robin, &hooks);
        assert_eq!(names(&result), vec!["B"]);
    }

    #[test]
    fn model_allowlist_filters_non_gemini_dialects() {
        let blacklist = BlacklistStore::new();
        let round_robin = RoundRobinState::new();
        let hooks = ValidationHooks::default();
        let mut restricted = provider("A", 1);
        restricted.model_allowlist = vec!["claude-3-opus".to_string()];
        let registry = vec![restricted, provider("B", 1)];

        let result = select(
            &Kind::Claude,
            Some("claude-3-sonnet"),
            &registry,
            &blacklist,
            &round_robin,
            &hooks,
        );
        assert_eq!(names(&result), vec!["B"]);
    }

    #[test]
    fn gemini_ignores_model_allowlist() {
        let blacklist = BlacklistStore::new();
        let round_robin = RoundRobinState::new();
        let hooks = ValidationHooks::default();
        let mut restricted = provider("A", 1);
        restricted.kind = Kind::Gemini;
        restricted.model_allowlist = vec!["gemini-pro".to_string()];
        let registry = vec![restricted];

        let result = select(
            &Kind::Gemini,
            Some("gemini-flash"),
            &registry,
            &blacklist,
            &round_robin,
            &hooks,
        );
        assert_eq!(names(&result), vec!["A"]);
    }
}
