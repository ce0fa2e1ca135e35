use anyhow::Result;

use crate::commands::{CommandReport, open_store};
use crate::convo::config::load_config;
use crate::convo::model::{InsertOutcome, NewMessage, Sender};
use crate::convo::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct InsertOptions {
    pub content: String,
    pub sender: Sender,
    pub session_key: String,
    pub order: i64,
    pub channel: String,
    pub timestamp: Option<String>,
    pub message_id: Option<String>,
}

pub fn run(opts: &InsertOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("insert");

    let outcome = store.insert(NewMessage {
        content: opts.content.clone(),
        sender: opts.sender,
        session_key: opts.session_key.clone(),
        order: opts.order,
        channel: opts.channel.clone(),
        timestamp: opts.timestamp.clone(),
        message_id: opts.message_id.clone(),
    })?;

    match &outcome {
        InsertOutcome::Inserted(id) => report.detail(format!("inserted message_id={id}")),
        InsertOutcome::Skipped(reason) => report.detail(format!("skipped: {reason}")),
    }
    report.detail(format!("count={}", store.count()?));
    Ok(report)
}
