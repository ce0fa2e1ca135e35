use anyhow::Result;

use crate::commands::{CommandReport, open_store};
use crate::convo::config::load_config;
use crate::convo::paths::resolve_paths;

pub fn run(message_id: &str) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("delete");

    if store.delete(message_id)? {
        report.detail(format!("deleted message_id={message_id}"));
    } else {
        report.issue(format!("message not found: {message_id}"));
    }
    report.detail(format!("count={}", store.count()?));
    Ok(report)
}
