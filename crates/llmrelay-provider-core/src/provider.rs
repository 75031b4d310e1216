use std::time::Duration;

/// The dialect family a provider serves. `Custom` covers configured kinds
/// beyond the three built-in dialects, matching the data model's
/// `custom:<x>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Claude,
    Codex,
    Gemini,
    Custom(String),
}

impl Kind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "claude" => Kind::Claude,
            "codex" => Kind::Codex,
            "gemini" => Kind::Gemini,
            other => Kind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Kind::Claude => "claude",
            Kind::Codex => "codex",
            Kind::Gemini => "gemini",
            Kind::Custom(name) => name,
        }
    }
}

/// One configured upstream endpoint for a given dialect.
///
/// `level` is carried exactly as configured; callers read it through
/// [`Provider::effective_level`] rather than relying on it already being
/// normalized, since the Registry normalizes on snapshot but a `Provider`
/// value may also be constructed directly in tests.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub kind: Kind,
    pub upstream_url: String,
    pub credential: String,
    pub level: i64,
    pub enabled: bool,
    pub model_allowlist: Vec<String>,
    pub per_provider_timeout: Option<Duration>,
}

impl Provider {
    /// Level ≤ 0 (including the unset default of 0) normalizes to 1.
    pub fn effective_level(&self) -> u32 {
        if self.level <= 0 {
            1
        } else {
            self.level as u32
        }
    }

    /// `enabled ⇒ (url ≠ ∅ ∧ credential ≠ ∅ for non-gemini; url ≠ ∅ for gemini)`
    pub fn has_valid_config(&self) -> bool {
        if self.upstream_url.is_empty() {
            return false;
        }
        match self.kind {
            Kind::Gemini => true,
            _ => !self.credential.is_empty(),
        }
    }

    /// Empty allowlist admits every model; otherwise an exact match is required.
    pub fn admits_model(&self, model: &str) -> bool {
        self.model_allowlist.is_empty() || self.model_allowlist.iter().any(|m| m == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Provider {
        Provider {
            name: "a".to_string(),
            kind: Kind::Claude,
            upstream_url: "https://example.test".to_string(),
            credential: "secret".to_string(),
            level: 0,
            enabled: true,
            model_allowlist: Vec::new(),
            per_provider_timeout: None,
        }
    }

    #[test]
    fn unset_level_normalizes_to_one() {
        assert_eq!(provider().effective_level(), 1);
    }

    #[test]
    fn negative_level_normalizes_to_one() {
        let mut p = provider();
        p.level = -4;
        assert_eq!(p.effective_level(), 1);
    }

    #[test]
    fn gemini_does_not_require_credential() {
        let mut p = provider();
        p.kind = Kind::Gemini;
        p.credential = String::new();
        assert!(p.has_valid_config());
    }

    #[test]
    fn non_gemini_requires_credential() {
        let mut p = provider();
        p.credential = String::new();
        assert!(!p.has_valid_config());
    }

    #[test]
    fn empty_allowlist_admits_any_model() {
        assert!(provider().admits_model("whatever"));
    }

    #[test]
    fn nonempty_allowlist_requires_exact_match() {
        let mut p = provider();
        p.model_allowlist = vec!["claude-3-opus".to_string()];
        assert!(p.admits_model("claude-3-opus"));
        assert!(!p.admits_model("claude-3-sonnet"));
    }
}
