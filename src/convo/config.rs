use crate::convo::canonical::{Canonicalizer, RoleMap};
use crate::convo::identity::IdentityResolver;
use crate::convo::local_index::DEFAULT_DIMENSIONS;
use crate::convo::noise::{NoiseFilter, NoiseProfile};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub default_channel: String,
    pub sniff_bytes: usize,
    pub human_role: String,
    pub agent_role: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_channel: "feishu".to_string(),
            sniff_bytes: 5000,
            human_role: "user".to_string(),
            agent_role: "assistant".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NoiseConfig {
    pub extra_markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dimensions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConvoConfig {
    pub import: ImportConfig,
    pub noise: NoiseConfig,
    pub identity: IdentityConfig,
    pub search: SearchConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialConvoConfig {
    import: Option<ImportConfig>,
    noise: Option<NoiseConfig>,
    identity: Option<IdentityConfig>,
    search: Option<SearchConfig>,
    index: Option<IndexConfig>,
}

impl ConvoConfig {
    pub fn role_map(&self) -> RoleMap {
        RoleMap {
            human: self.import.human_role.clone(),
            agent: self.import.agent_role.clone(),
        }
    }

    pub fn noise_filter(&self, profile: NoiseProfile) -> NoiseFilter {
        NoiseFilter::new(profile, &self.noise.extra_markers)
    }

    pub fn identity_resolver(&self) -> Result<IdentityResolver> {
        IdentityResolver::with_patterns(&self.identity.extra_patterns)
            .map_err(|err| anyhow!("invalid identity pattern: {err}"))
    }

    pub fn canonicalizer(&self, profile: NoiseProfile) -> Result<Canonicalizer> {
        Ok(Canonicalizer::new(
            self.role_map(),
            self.noise_filter(profile),
            self.identity_resolver()?,
        ))
    }
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_or_usize(lookup: Lookup<'_>, var: &str, fallback: usize) -> usize {
    match lookup(var) {
        Some(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        None => fallback,
    }
}

fn env_or_string(lookup: Lookup<'_>, var: &str, fallback: &str) -> String {
    match lookup(var) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_csv(lookup: Lookup<'_>, var: &str, fallback: &[String]) -> Vec<String> {
    match lookup(var) {
        Some(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        None => fallback.to_vec(),
    }
}

/// One entry per line; regexes routinely contain commas.
fn env_or_lines(lookup: Lookup<'_>, var: &str, fallback: &[String]) -> Vec<String> {
    match lookup(var) {
        Some(v) => {
            let out = v
                .lines()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        None => fallback.to_vec(),
    }
}

pub fn validate(cfg: &ConvoConfig) -> Result<()> {
    if cfg.import.sniff_bytes == 0 {
        return Err(anyhow!("invalid import sniff bytes: must be >= 1"));
    }
    if cfg.import.default_channel.trim().is_empty() {
        return Err(anyhow!("invalid import default channel: cannot be empty"));
    }
    let human = cfg.import.human_role.trim();
    let agent = cfg.import.agent_role.trim();
    if human.is_empty() || agent.is_empty() {
        return Err(anyhow!("invalid import roles: human and agent roles are required"));
    }
    if human == agent {
        return Err(anyhow!(
            "invalid import roles: human and agent roles must differ (both `{human}`)"
        ));
    }
    if cfg.search.default_limit == 0 {
        return Err(anyhow!("invalid search default limit: must be >= 1"));
    }
    if cfg.index.dimensions < 8 {
        return Err(anyhow!("invalid index dimensions: must be >= 8"));
    }
    cfg.identity_resolver()?;
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CONVO_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".convo-db").join("convo.toml"))
}

fn merge_file_config(base: &mut ConvoConfig, raw: &str) -> Result<()> {
    let parsed: PartialConvoConfig = toml::from_str(raw)?;
    if let Some(import) = parsed.import {
        base.import = import;
    }
    if let Some(noise) = parsed.noise {
        base.noise = noise;
    }
    if let Some(identity) = parsed.identity {
        base.identity = identity;
    }
    if let Some(search) = parsed.search {
        base.search = search;
    }
    if let Some(index) = parsed.index {
        base.index = index;
    }
    Ok(())
}

fn apply_env(cfg: &mut ConvoConfig, lookup: Lookup<'_>) {
    cfg.import.default_channel =
        env_or_string(lookup, "CONVO_DEFAULT_CHANNEL", &cfg.import.default_channel);
    cfg.import.sniff_bytes = env_or_usize(lookup, "CONVO_SNIFF_BYTES", cfg.import.sniff_bytes);
    cfg.import.human_role = env_or_string(lookup, "CONVO_HUMAN_ROLE", &cfg.import.human_role);
    cfg.import.agent_role = env_or_string(lookup, "CONVO_AGENT_ROLE", &cfg.import.agent_role);
    cfg.noise.extra_markers = env_or_csv(lookup, "CONVO_NOISE_MARKERS", &cfg.noise.extra_markers);
    cfg.identity.extra_patterns =
        env_or_lines(lookup, "CONVO_ID_PATTERNS", &cfg.identity.extra_patterns);
    cfg.search.default_limit =
        env_or_usize(lookup, "CONVO_SEARCH_LIMIT", cfg.search.default_limit);
    cfg.index.dimensions = env_or_usize(lookup, "CONVO_EMBED_DIMENSIONS", cfg.index.dimensions);
}

fn build_config(file_raw: Option<&str>, lookup: Lookup<'_>) -> Result<ConvoConfig> {
    let mut cfg = ConvoConfig::default();
    if let Some(raw) = file_raw {
        merge_file_config(&mut cfg, raw)?;
    }
    apply_env(&mut cfg, lookup);
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config() -> Result<ConvoConfig> {
    let lookup = |var: &str| env::var(var).ok();
    let Some(path) = resolve_config_path().filter(|p| p.exists()) else {
        return build_config(None, &lookup);
    };
    let raw = fs::read_to_string(&path)?;
    build_config(Some(&raw), &lookup)
        .map_err(|err| anyhow!("failed to load convo config {}: {err}", path.display()))
}
