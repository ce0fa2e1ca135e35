pub mod delete;
pub mod import;
pub mod insert;
pub mod query;
pub mod stats;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::convo::config::ConvoConfig;
use crate::convo::local_index::LocalIndex;
use crate::convo::paths::ConvoPaths;
use crate::convo::store::ConversationStore;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Text output prints `data` instead of `details`.
    #[serde(skip)]
    pub data_is_output: bool,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
            data_is_output: false,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn set_data<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }

    /// Result records of a query command.
    pub fn set_records<T: Serialize>(&mut self, records: &T) -> Result<()> {
        self.set_data(records)?;
        self.data_is_output = true;
        Ok(())
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
        if other.data.is_some() {
            self.data = other.data;
            self.data_is_output = other.data_is_output;
        }
    }
}

pub fn open_store(paths: &ConvoPaths, cfg: &ConvoConfig) -> Result<ConversationStore<LocalIndex>> {
    let index = LocalIndex::open(&paths.index_file, cfg.index.dimensions)
        .with_context(|| format!("failed to open index {}", paths.index_file.display()))?;
    Ok(ConversationStore::new(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_flips_ok_and_merge_keeps_it() {
        let mut outer = CommandReport::new("import");
        let mut inner = CommandReport::new("import");
        inner.detail("scanned=1");
        inner.issue("a.jsonl: failed");
        outer.merge(inner);
        assert!(!outer.ok);
        assert_eq!(outer.details, vec!["scanned=1".to_string()]);
    }

    #[test]
    fn data_is_omitted_when_absent() {
        let report = CommandReport::new("stats");
        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json.get("data").is_none());

        let mut with_data = CommandReport::new("sessions");
        with_data.set_records(&vec!["s1"]).expect("data");
        assert!(with_data.data_is_output);
        assert_eq!(with_data.data, Some(serde_json::json!(["s1"])));
    }
}
