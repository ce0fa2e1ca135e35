use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ConvoPaths {
    pub convo_home: PathBuf,
    pub index_file: PathBuf,
    pub openclaw_sessions_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

pub(crate) fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    env_path(var).unwrap_or(fallback)
}

pub fn resolve_paths() -> Result<ConvoPaths> {
    let home = required_home_dir()?;
    let convo_home = env_or_default_path("CONVO_HOME", home.join(".convo-db"));
    let index_file = env_or_default_path("CONVO_INDEX_FILE", convo_home.join("index.jsonl"));
    let openclaw_sessions_dir = env_or_default_path(
        "OPENCLAW_SESSIONS_DIR",
        home.join(".openclaw/agents/main/sessions"),
    );

    Ok(ConvoPaths {
        convo_home,
        index_file,
        openclaw_sessions_dir,
    })
}
