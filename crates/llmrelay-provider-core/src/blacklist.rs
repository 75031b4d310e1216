use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// In-memory, thread-safe map from (kind, provider-name) to an expiry
/// timestamp and rolling failure counter. All operations are O(1) map
/// lookups so a single coarse mutex (never held across an await point) is
/// sufficient.
#[derive(Default)]
pub struct BlacklistStore {
    entries: Mutex<HashMap<(String, String), Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    until: SystemTime,
    failure_count: u32,
}

impl BlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff an entry is present and still in its blacklist window.
    /// Stale entries are removed lazily on read.
    pub fn check(&self, kind: &str, name: &str) -> (bool, Option<SystemTime>) {
        let now = SystemTime::now();
        let key = (kind.to_string(), name.to_string());
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some(entry) if entry.until > now => (true, Some(entry.until)),
            Some(_) => {
                entries.remove(&key);
                (false, None)
            }
            None => (false, None),
        }
    }

    /// Increments the failure counter; once it reaches `threshold` the
    /// provider is blacklisted until `now + duration` and the counter
    /// resets. `threshold`/`duration` are supplied by the caller, not
    /// baked into the store, so different policies can share this state.
    pub fn record_failure(&self, kind: &str, name: &str, threshold: u32, duration: Duration) {
        let key = (kind.to_string(), name.to_string());
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key).or_insert(Entry {
            until: SystemTime::UNIX_EPOCH,
            failure_count: 0,
        });
        entry.failure_count += 1;
        if entry.failure_count >= threshold.max(1) {
            entry.until = SystemTime::now() + duration;
            entry.failure_count = 0;
        }
    }

    pub fn record_success(&self, kind: &str, name: &str) {
        let key = (kind.to_string(), name.to_string());
        self.entries.lock().unwrap().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_provider_is_not_blacklisted() {
        let store = BlacklistStore::new();
        let (blacklisted, _) = store.check("claude", "a");
        assert!(!blacklisted);
    }

    #[test]
    fn reaching_threshold_blacklists_and_resets_counter() {
        let store = BlacklistStore::new();
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        assert!(!store.check("claude", "a").0);
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        assert!(store.check("claude", "a").0);
    }

    #[test]
    fn success_clears_entry_entirely() {
        let store = BlacklistStore::new();
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        store.record_success("claude", "a");
        store.record_failure("claude", "a", 3, Duration::from_secs(60));
        assert!(!store.check("claude", "a").0, "counter should have reset on success");
    }

    #[test]
    fn different_kinds_are_independent() {
        let store = BlacklistStore::new();
        for _ in 0..3 {
            store.record_failure("claude", "a", 3, Duration::from_secs(60));
        }
        assert!(store.check("claude", "a").0);
        assert!(!store.check("codex", "a").0);
    }
}
