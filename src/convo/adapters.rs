use crate::convo::canonical::{Canonical, Canonicalizer, EntryContext, RawEntry, is_unset_timestamp};
use crate::convo::model::SkipReason;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Marker the Feishu bridge writes into every inbound prompt.
pub const FEISHU_SNIFF_MARKER: &str = "message_id: om_";

pub const DEFAULT_HISTORY_SESSION: &str = "main";

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Message(RawEntry),
    NotAMessage,
}

fn raw_entry(message: &Value, outer_timestamp: Option<&Value>) -> RawEntry {
    let timestamp = message
        .get("timestamp")
        .filter(|v| !is_unset_timestamp(v))
        .or(outer_timestamp.filter(|v| !is_unset_timestamp(v)))
        .cloned();
    RawEntry {
        role: message
            .get("role")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        content: message.get("content").cloned().unwrap_or(Value::Null),
        timestamp,
    }
}

/// Resolve a transcript line to the flat `{role, content, timestamp}` shape.
/// Lines may be flat or wrapped as `{"message": {...}}`; anything else
/// (session headers, model-change events) carries no message.
pub fn normalize_envelope(line: &Value) -> Envelope {
    if let Some(message) = line.get("message").filter(|m| m.is_object()) {
        return Envelope::Message(raw_entry(message, line.get("timestamp")));
    }
    if line.get("role").is_some() {
        return Envelope::Message(raw_entry(line, None));
    }
    Envelope::NotAMessage
}

/// Best-effort pre-filter: does the first `limit` bytes of the file contain
/// `marker`? Unreadable files report `false`. Entry-level canonicalization
/// stays the real filter.
pub fn sniff_prefix(path: &Path, limit: usize, marker: &str) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    if file.take(limit as u64).read_to_end(&mut buf).is_err() {
        return false;
    }
    String::from_utf8_lossy(&buf).contains(marker)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedEntry {
    pub index: u64,
    pub outcome: Canonical,
}

/// Reads transcripts and runs every entry through a canonicalizer.
pub struct TranscriptAdapter<'a> {
    canonicalizer: &'a Canonicalizer,
    channel: &'a str,
}

impl<'a> TranscriptAdapter<'a> {
    pub fn new(canonicalizer: &'a Canonicalizer, channel: &'a str) -> Self {
        Self {
            canonicalizer,
            channel,
        }
    }

    fn adapt_value(&self, value: &Value, session_key: &str, index: u64) -> Canonical {
        match normalize_envelope(value) {
            Envelope::Message(entry) => self.canonicalizer.canonicalize(
                &entry,
                EntryContext {
                    session_key,
                    index,
                    channel: self.channel,
                },
            ),
            Envelope::NotAMessage => Canonical::Skip(SkipReason::NotAMessage),
        }
    }

    /// Newline-delimited JSON, one entry per non-blank line. Every non-blank
    /// line consumes a sequence index, including malformed ones, so derived
    /// ids stay put when a file grows by appending.
    pub fn adapt_jsonl_str(&self, raw: &str, session_key: &str) -> Vec<AdaptedEntry> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(idx, line)| {
                let index = idx as u64;
                let outcome = match serde_json::from_str::<Value>(line) {
                    Ok(value) => self.adapt_value(&value, session_key, index),
                    Err(err) => Canonical::Skip(SkipReason::Malformed(format!("invalid json: {err}"))),
                };
                AdaptedEntry { index, outcome }
            })
            .collect()
    }

    pub fn adapt_jsonl_file(&self, path: &Path, session_key: &str) -> Result<Vec<AdaptedEntry>> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let raw = String::from_utf8_lossy(&bytes);
        Ok(self.adapt_jsonl_str(&raw, session_key))
    }

    /// A history export: `{"sessionKey": "...", "messages": [...]}`.
    /// Session key precedence: `session_override`, the document's own key,
    /// then [`DEFAULT_HISTORY_SESSION`]. Returns the key used.
    pub fn adapt_history_str(
        &self,
        raw: &str,
        session_override: Option<&str>,
    ) -> Result<(String, Vec<AdaptedEntry>)> {
        let doc: Value = serde_json::from_str(raw).context("history export is not valid JSON")?;
        let session_key = session_override
            .or_else(|| doc.get("sessionKey").and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_HISTORY_SESSION)
            .to_string();
        let messages = doc
            .get("messages")
            .and_then(Value::as_array)
            .context("history export has no `messages` array")?;
        let entries = messages
            .iter()
            .enumerate()
            .map(|(idx, value)| AdaptedEntry {
                index: idx as u64,
                outcome: self.adapt_value(value, &session_key, idx as u64),
            })
            .collect();
        Ok((session_key, entries))
    }

    pub fn adapt_history_file(
        &self,
        path: &Path,
        session_override: Option<&str>,
    ) -> Result<(String, Vec<AdaptedEntry>)> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.adapt_history_str(&raw, session_override)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}
