use anyhow::{Context as AnyhowContext, Result};
use context_agent::AgentConfig;
use context_indexer::{clamp_scan_concurrency, scan_concurrency_from_env, ScanOptions};
use context_pack::SectionLimits;
use context_protocol::ContextBudget;
use context_sandbox::SandboxConfig;
use context_search::RelevanceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up under the workspace root when no `--config` is given.
pub const CONFIG_RELATIVE_PATH: &str = ".context/config.toml";

pub const ENV_MAX_CHARS: &str = "CONTEXT_MAX_CHARS";
pub const ENV_SCAN_CONCURRENCY: &str = "CONTEXT_SCAN_CONCURRENCY";
pub const ENV_MAX_TURNS: &str = "CONTEXT_MAX_TURNS";
pub const ENV_CACHE_TTL_SECS: &str = "CONTEXT_CACHE_TTL_SECS";

const MAX_AGENT_TURNS: usize = 20;
const MIN_TOTAL_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Gitignore-style patterns on top of the built-in exclusions.
    pub ignore_patterns: Vec<String>,
    /// Extensions accepted in addition to the built-in source list.
    pub extra_extensions: Vec<String>,
    pub max_file_size_bytes: u64,
    pub concurrency: usize,
    pub respect_gitignore: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let defaults = ScanOptions::default();
        Self {
            ignore_patterns: Vec::new(),
            extra_extensions: Vec::new(),
            max_file_size_bytes: defaults.max_file_size_bytes,
            concurrency: scan_concurrency_from_env(),
            respect_gitignore: defaults.respect_gitignore,
        }
    }
}

impl ScanConfig {
    pub fn to_options(&self) -> ScanOptions {
        let mut options = ScanOptions::default();
        options.ignore_patterns = self.ignore_patterns.clone();
        for ext in &self.extra_extensions {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !options.extension_allow_list.contains(&ext) {
                options.extension_allow_list.push(ext);
            }
        }
        options.max_file_size_bytes = self.max_file_size_bytes;
        options.concurrency_limit = clamp_scan_concurrency(self.concurrency);
        options.respect_gitignore = self.respect_gitignore;
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub scan_ttl_secs: u64,
    pub selection_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scan_ttl_secs: 300,
            selection_ttl_secs: 120,
        }
    }
}

impl CacheConfig {
    pub fn scan_ttl(&self) -> Duration {
        Duration::from_secs(self.scan_ttl_secs)
    }

    pub fn selection_ttl(&self) -> Duration {
        Duration::from_secs(self.selection_ttl_secs)
    }
}

/// Everything tunable about one engine, as read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scan: ScanConfig,
    pub relevance: RelevanceConfig,
    pub sandbox: SandboxConfig,
    pub agent: AgentConfig,
    pub budget: ContextBudget,
    pub sections: SectionLimits,
    pub cache: CacheConfig,
}

impl EngineConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Invalid engine config")?;
        config
            .relevance
            .validate()
            .context("Invalid [relevance] section")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("In {}", path.display()))
    }

    /// `explicit` when given, else `<root>/.context/config.toml` when it
    /// exists, else defaults. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>, root: Option<&Path>) -> Result<Self> {
        let discovered: Option<PathBuf> = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => root
                .map(|root| root.join(CONFIG_RELATIVE_PATH))
                .filter(|path| path.is_file()),
        };
        let mut config = match discovered {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `CONTEXT_*` overrides. Unparsable values are ignored with a
    /// warning; parsed ones are clamped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(chars) = parse_env::<usize>(&lookup, ENV_MAX_CHARS) {
            self.set_max_total_chars(chars.max(MIN_TOTAL_CHARS));
        }
        if let Some(concurrency) = parse_env::<usize>(&lookup, ENV_SCAN_CONCURRENCY) {
            self.scan.concurrency = clamp_scan_concurrency(concurrency);
        }
        if let Some(turns) = parse_env::<usize>(&lookup, ENV_MAX_TURNS) {
            self.agent.max_turns = turns.clamp(1, MAX_AGENT_TURNS);
        }
        if let Some(ttl) = parse_env::<u64>(&lookup, ENV_CACHE_TTL_SECS) {
            self.cache.scan_ttl_secs = ttl;
            self.cache.selection_ttl_secs = ttl;
        }
    }

    /// Sets the total budget and caps every sub-budget by it.
    pub fn set_max_total_chars(&mut self, chars: usize) {
        let budget = &mut self.budget;
        budget.max_total_chars = chars;
        budget.max_per_file_chars = budget.max_per_file_chars.min(chars);
        budget.max_symbol_chars = budget.max_symbol_chars.min(chars);
        budget.max_active_symbol_detail_chars = budget.max_active_symbol_detail_chars.min(chars);
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a number");
            None
        }
    }
}
