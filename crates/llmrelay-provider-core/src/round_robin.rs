use std::collections::HashMap;
use std::sync::Mutex;

use crate::provider::Provider;

/// Per-(platform, level) memory of which provider name was tried first on
/// the previous request at that key.
///
/// Deliberately a single name rather than an index: when the provider list
/// at a key changes between requests, a stale index could point at the
/// wrong provider or panic on out-of-range, whereas a missing name
/// degrades gracefully to "restart from the front".
#[derive(Default)]
pub struct RoundRobinState {
    last_start: Mutex<HashMap<String, String>>,
}

impl RoundRobinState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotates `providers` so the entry after the previous request's
    /// starting point comes first; consumed and returned reordered.
    pub fn reorder(&self, platform: &str, level: u32, providers: Vec<Provider>) -> Vec<Provider> {
        let n = providers.len();
        if n <= 1 {
            return providers;
        }

        let key = format!("{platform}:{level}");
        let mut last_start = self.last_start.lock().unwrap();
        let last = last_start.get(&key).cloned();

        let found = last.and_then(|name| providers.iter().position(|p| p.name == name));

        let Some(i) = found else {
            last_start.insert(key, providers[0].name.clone());
            return providers;
        };

        let mut output = Vec::with_capacity(n);
        for offset in 1..=n {
            output.push(providers[(i + offset) % n].clone());
        }
        last_start.insert(key, output[0].name.clone());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Kind;

    fn providers(names: &[&str]) -> Vec<Provider> {
        names
            .iter()
            .map(|name| Provider {
                name: name.to_string(),
                kind: Kind::Claude,
                upstream_url: "https://example.test".to_string(),
                credential: "secret".to_string(),
                level: 1,
                enabled: true,
                model_allowlist: Vec::new(),
                per_provider_timeout: None,
            })
            .collect()
    }

    fn names(providers: &[Provider]) -> Vec<&str> {
        providers.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn single_provider_list_is_returned_unchanged() {
        let state = RoundRobinState::new();
        let out = state.reorder("claude", 1, providers(&["a"]));
        assert_eq!(names(&out), vec!["a"]);
    }

    #[test]
    fn four_request_rotation_matches_scenario_one() {
        let state = RoundRobinState::new();

        let r1 = state.reorder("claude", 1, providers(&["A", "B", "C"]));
        assert_eq!(names(&r1), vec!["A", "B", "C"]);

        let r2 = state.reorder("claude", 1, providers(&["A", "B", "C"]));
        assert_eq!(names(&r2), vec!["B", "C", "A"]);

        let r3 = state.reorder("claude", 1, providers(&["A", "B", "C"]));
        assert_eq!(names(&r3), vec!["C", "A", "B"]);

        let r4 = state.reorder("claude", 1, providers(&["A", "B", "C"]));
        assert_eq!(names(&r4), vec!["A", "B", "C"]);
    }

    #[test]
    fn stale_last_start_not_in_list_restarts_from_front() {
        let state = RoundRobinState::new();
        state.reorder("claude", 1, providers(&["A", "B"]));
        // A was removed from configuration between requests.
        let out = state.reorder("claude", 1, providers(&["B", "C"]));
        assert_eq!(names(&out), vec!["B", "C"]);
    }

    #[test]
    fn distinct_levels_rotate_independently() {
        let state = RoundRobinState::new();
        state.reorder("claude", 1, providers(&["A", "B"]));
        let level2 = state.reorder("claude", 2, providers(&["A", "B"]));
        assert_eq!(names(&level2), vec!["A", "B"]);
    }
}
