use anyhow::Result;
use serde::Serialize;

use crate::commands::{CommandReport, open_store};
use crate::convo::config::{load_config, resolve_config_path};
use crate::convo::paths::resolve_paths;

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub sessions: usize,
    pub index_file: String,
    pub sessions_dir: String,
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("stats");

    let stats = StoreStats {
        count: store.count()?,
        sessions: store.list_sessions()?.len(),
        index_file: paths.index_file.display().to_string(),
        sessions_dir: paths.openclaw_sessions_dir.display().to_string(),
    };

    report.detail(format!("convo_home={}", paths.convo_home.display()));
    report.detail(format!("index_file={}", stats.index_file));
    report.detail(format!("openclaw_sessions_dir={}", stats.sessions_dir));
    if let Some(config_path) = resolve_config_path() {
        let state = if config_path.exists() { "loaded" } else { "absent" };
        report.detail(format!("config={} ({state})", config_path.display()));
    }
    report.detail(format!("count={}", stats.count));
    report.detail(format!("sessions={}", stats.sessions));
    report.set_data(&stats)?;
    Ok(report)
}
