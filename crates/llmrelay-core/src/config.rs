use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use llmrelay_common::{GlobalConfig, GlobalConfigPatch, RelayMode};
use llmrelay_provider_core::{Kind, Provider};
use serde::Deserialize;

use crate::error::ConfigError;

/// CLI flags / env vars that override the TOML file. Precedence is
/// CLI > ENV > file, matching the teacher's bootstrap merge order minus
/// the admin-editable database layer this gateway doesn't have.
#[derive(Debug, Clone, Parser)]
#[command(name = "llmrelay", about = "Multi-dialect LLM relay gateway")]
pub struct CliArgs {
    /// Path to the TOML config file.
    #[arg(long, env = "LLMRELAY_CONFIG", default_value = "./llmrelay.toml")]
    pub config: PathBuf,

    #[arg(long, env = "LLMRELAY_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    #[arg(long, env = "LLMRELAY_FAILURE_THRESHOLD")]
    pub failure_threshold: Option<u32>,

    #[arg(long, env = "LLMRELAY_RETRY_WAIT_SECONDS")]
    pub retry_wait_seconds: Option<u64>,

    /// `blacklist` or `fallback`.
    #[arg(long, env = "LLMRELAY_MODE")]
    pub mode: Option<String>,

    #[arg(long, env = "LLMRELAY_BLACKLIST_DURATION_SECONDS")]
    pub blacklist_duration_seconds: Option<u64>,

    /// SeaORM connection string for the `request_log` table. Not part of
    /// [`GlobalConfig`]: it is read once at process startup to open the
    /// connection and never re-merged or reloaded afterwards.
    #[arg(long, env = "LLMRELAY_DATABASE_URL", default_value = "sqlite://./llmrelay.db?mode=rwc")]
    pub database_url: String,
}

impl CliArgs {
    fn into_patch(self) -> Result<GlobalConfigPatch, ConfigError> {
        let mode = match self.mode {
            Some(raw) => Some(parse_mode(&raw)?),
            None => None,
        };
        Ok(GlobalConfigPatch {
            listen_addr: self.listen_addr,
            failure_threshold: self.failure_threshold,
            retry_wait_seconds: self.retry_wait_seconds,
            mode,
            blacklist_duration_seconds: self.blacklist_duration_seconds,
        })
    }
}

fn parse_mode(raw: &str) -> Result<RelayMode, ConfigError> {
    match raw {
        "blacklist" => Ok(RelayMode::Blacklist),
        "fallback" => Ok(RelayMode::Fallback),
        other => Err(ConfigError::InvalidMode(other.to_string())),
    }
}

/// On-disk shape of one provider entry. `credential`/`model_allowlist`
/// default to empty so a minimal gemini entry (`url` only) still parses.
#[derive(Debug, Clone, Deserialize)]
struct ProviderFileConfig {
    name: String,
    #[serde(default)]
    upstream_url: String,
    #[serde(default)]
    credential: String,
    #[serde(default)]
    level: i64,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    model_allowlist: Vec<String>,
    #[serde(default)]
    per_provider_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// On-disk shape of the whole TOML file. `providers` is keyed by dialect
/// name (`claude`, `codex`, `gemini`, or any `custom:<x>` string) rather
/// than a fixed struct field, so a deployment can add a provider pool for
/// a dialect this gateway doesn't name explicitly.
#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    listen_addr: Option<String>,
    #[serde(default)]
    failure_threshold: Option<u32>,
    #[serde(default)]
    retry_wait_seconds: Option<u64>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    blacklist_duration_seconds: Option<u64>,
    #[serde(default)]
    providers: HashMap<String, Vec<ProviderFileConfig>>,
}

/// The merged result of loading `--config` plus CLI/env overrides.
pub struct LoadedConfig {
    pub global: GlobalConfig,
    pub providers: Vec<Provider>,
}

/// Reads `args.config`, validates every provider against spec.md §3's
/// config invariant, and merges CLI/env overrides onto the file values.
/// Fails fast (no partial config is ever handed to the rest of the
/// process) on a missing file, unparseable TOML, or an invalid provider.
pub fn load(args: CliArgs) -> Result<LoadedConfig> {
    let config_path = args.config.clone();
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading config file {}", config_path.display()))?;
    let file: FileConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", config_path.display()))?;

    let mut patch = GlobalConfigPatch::default();
    patch.overlay(from_file(&file)?);
    patch.overlay(args.into_patch()?);
    let global = patch
        .into_config()
        .context("finalizing merged global config")?;

    let mut providers = Vec::new();
    for (kind_raw, entries) in &file.providers {
        let kind = Kind::parse(kind_raw);
        for entry in entries {
            let provider = to_provider(kind.clone(), entry.clone());
            if provider.enabled && !provider.has_valid_config() {
                return Err(ConfigError::InvalidProvider {
                    kind: kind_raw.clone(),
                    name: provider.name.clone(),
                }
                .into());
            }
            providers.push(provider);
        }
    }

    Ok(LoadedConfig { global, providers })
}

fn from_file(file: &FileConfig) -> Result<GlobalConfigPatch, ConfigError> {
    let mode = match &file.mode {
        Some(raw) => Some(parse_mode(raw)?),
        None => None,
    };
    Ok(GlobalConfigPatch {
        listen_addr: file.listen_addr.clone(),
        failure_threshold: file.failure_threshold,
        retry_wait_seconds: file.retry_wait_seconds,
        mode,
        blacklist_duration_seconds: file.blacklist_duration_seconds,
    })
}

fn to_provider(kind: Kind, entry: ProviderFileConfig) -> Provider {
    Provider {
        name: entry.name,
        kind,
        upstream_url: entry.upstream_url,
        credential: entry.credential,
        level: entry.level,
        enabled: entry.enabled,
        model_allowlist: entry.model_allowlist,
        per_provider_timeout: entry.per_provider_timeout_secs.map(Duration::from_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(config: &str) -> CliArgs {
        CliArgs {
            config: config.into(),
            listen_addr: None,
            failure_threshold: None,
            retry_wait_seconds: None,
            mode: None,
            blacklist_duration_seconds: None,
            database_url: "sqlite::memory:".to_string(),
        }
    }

    #[test]
    fn parses_minimal_gemini_provider_without_credential() {
        let toml = r#"
            [providers]
            gemini = [{ name = "g1", upstream_url = "https://example.test" }]
        "#;
        let file: FileConfig = toml::from_str(toml).unwrap();
        let entry = file.providers.get("gemini").unwrap()[0].clone();
        let provider = to_provider(Kind::Gemini, entry);
        assert!(provider.has_valid_config());
    }

    #[test]
    fn enabled_claude_provider_without_credential_is_invalid() {
        let toml = r#"
            [providers]
            claude = [{ name = "c1", upstream_url = "https://example.test" }]
        "#;
        let file: FileConfig = toml::from_str(toml).unwrap();
        let entry = file.providers.get("claude").unwrap()[0].clone();
        let provider = to_provider(Kind::Claude, entry);
        assert!(!provider.has_valid_config());
    }

    #[test]
    fn cli_mode_overrides_file_mode() {
        let mut patch = GlobalConfigPatch::default();
        patch.overlay(
            from_file(&FileConfig {
                mode: Some("fallback".to_string()),
                ..Default::default()
            })
            .unwrap(),
        );
        let mut cli = args("./llmrelay.toml");
        cli.mode = Some("blacklist".to_string());
        patch.overlay(cli.into_patch().unwrap());
        assert_eq!(patch.mode, Some(RelayMode::Blacklist));
    }

    #[test]
    fn invalid_mode_string_is_rejected() {
        assert!(parse_mode("nonsense").is_err());
    }
}
