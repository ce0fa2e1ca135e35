use anyhow::Result;

use crate::commands::{CommandReport, open_store};
use crate::convo::config::load_config;
use crate::convo::model::{MessageRecord, Sender};
use crate::convo::paths::resolve_paths;
use crate::convo::timestamp::parse_instant;

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub limit: Option<usize>,
    pub sender: Option<Sender>,
}

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub start: String,
    pub end: String,
    pub sender: Option<Sender>,
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut = flat.chars().take(PREVIEW_CHARS).collect::<String>();
    format!("{cut}...")
}

fn describe(record: &MessageRecord) -> String {
    format!(
        "[{}] {} #{} {}: {}",
        record.timestamp,
        record.session_key,
        record.order,
        record.sender,
        preview(&record.content)
    )
}

pub fn run_search(opts: &SearchOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("search");

    let limit = opts.limit.unwrap_or(cfg.search.default_limit);
    let hits = store.search(&opts.query, limit, opts.sender)?;
    report.detail(format!("query={} limit={limit} hits={}", opts.query, hits.len()));
    for hit in &hits {
        report.detail(format!("{:.4} {}", hit.distance, describe(&hit.record)));
    }
    report.set_records(&hits)?;
    Ok(report)
}

pub fn run_history(opts: &HistoryOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("history");

    let start = parse_instant(&opts.start)?;
    let end = parse_instant(&opts.end)?;
    let records = store.query_by_time(start, end, opts.sender)?;
    report.detail(format!(
        "range={}..{} messages={}",
        start.to_rfc3339(),
        end.to_rfc3339(),
        records.len()
    ));
    for record in &records {
        report.detail(describe(record));
    }
    report.set_records(&records)?;
    Ok(report)
}

pub fn run_session(session_key: &str) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("session");

    let records = store.query_by_session(session_key)?;
    report.detail(format!("session={session_key} messages={}", records.len()));
    for record in &records {
        report.detail(describe(record));
    }
    report.set_records(&records)?;
    Ok(report)
}

pub fn run_sessions() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("sessions");

    let sessions = store.list_sessions()?;
    report.detail(format!("sessions={}", sessions.len()));
    for session in &sessions {
        report.detail(session.clone());
    }
    report.set_records(&sessions)?;
    Ok(report)
}

pub fn run_get(message_id: &str) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = open_store(&paths, &cfg)?;
    let mut report = CommandReport::new("get");

    match store.get(message_id)? {
        Some(record) => {
            report.detail(describe(&record));
            report.set_records(&record)?;
        }
        None => report.issue(format!("message not found: {message_id}")),
    }
    Ok(report)
}
