use crate::convo::adapters::{AdaptedEntry, FEISHU_SNIFF_MARKER, TranscriptAdapter, sniff_prefix};
use crate::convo::canonical::Canonical;
use crate::convo::index::VectorIndex;
use crate::convo::model::{InsertOutcome, SkipReason};
use crate::convo::store::ConversationStore;
use crate::convo::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Only session files that carry Feishu thread markers.
    #[default]
    Feishu,
    /// Every session file in the directory.
    All,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Feishu => "feishu",
            SourceKind::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub source: SourceKind,
    pub sniff_bytes: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub role: usize,
    pub noise: usize,
    pub malformed: usize,
    pub not_message: usize,
    pub duplicate: usize,
    pub backend: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::UnsupportedRole(_) => self.role += 1,
            SkipReason::Noise(_) => self.noise += 1,
            SkipReason::Malformed(_) => self.malformed += 1,
            SkipReason::NotAMessage => self.not_message += 1,
            SkipReason::Duplicate(_) => self.duplicate += 1,
            SkipReason::Backend(_) => self.backend += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.role + self.noise + self.malformed + self.not_message + self.duplicate + self.backend
    }

    pub fn absorb(&mut self, other: &SkipCounts) {
        self.role += other.role;
        self.noise += other.noise;
        self.malformed += other.malformed;
        self.not_message += other.not_message;
        self.duplicate += other.duplicate;
        self.backend += other.backend;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileImportSummary {
    pub file: String,
    pub session_key: String,
    pub imported: usize,
    pub skipped: SkipCounts,
    pub error: Option<String>,
}

impl FileImportSummary {
    fn new(path: &Path, session_key: &str) -> Self {
        Self {
            file: file_label(path),
            session_key: session_key.to_string(),
            imported: 0,
            skipped: SkipCounts::default(),
            error: None,
        }
    }

    pub fn render(&self) -> String {
        if let Some(err) = &self.error {
            return format!("{}: failed ({err})", self.file);
        }
        let s = &self.skipped;
        format!(
            "{}: +{} imported, {} skipped (role={} noise={} malformed={} not_message={} duplicate={} backend={})",
            self.file,
            self.imported,
            s.total(),
            s.role,
            s.noise,
            s.malformed,
            s.not_message,
            s.duplicate,
            s.backend
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub source: String,
    pub scanned_files: usize,
    pub selected_files: usize,
    pub failed_files: usize,
    pub imported: usize,
    pub skipped: usize,
    pub final_count: usize,
    pub dry_run: bool,
    pub files: Vec<FileImportSummary>,
}

impl ImportSummary {
    fn absorb(&mut self, file: FileImportSummary) {
        if file.error.is_some() {
            self.failed_files += 1;
        }
        self.imported += file.imported;
        self.skipped += file.skipped.total();
        self.files.push(file);
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| path.display().to_string())
}

pub fn session_key_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("session")
        .to_string()
}

/// `*.jsonl` files directly under `dir`, in lexicographic name order.
pub fn list_transcripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in read_dir {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn store_entries<I: VectorIndex>(
    store: &mut ConversationStore<I>,
    entries: Vec<AdaptedEntry>,
    summary: &mut FileImportSummary,
    dry_run: bool,
) {
    // Ids a dry run would have written; the store itself never sees them.
    let mut planned = HashSet::new();
    for AdaptedEntry { index, outcome } in entries {
        let message = match outcome {
            Canonical::Skip(reason) => {
                record_skip(summary, index, reason);
                continue;
            }
            Canonical::Record(message) => message,
        };
        let result = if dry_run {
            store.check(message)
        } else {
            store.insert(message)
        };
        let reason = match result {
            Ok(InsertOutcome::Inserted(id)) if dry_run && !planned.insert(id.clone()) => {
                SkipReason::Duplicate(id)
            }
            Ok(InsertOutcome::Inserted(_)) => {
                summary.imported += 1;
                continue;
            }
            Ok(InsertOutcome::Skipped(reason)) => reason,
            Err(err) if err.is_validation() => SkipReason::Malformed(err.to_string()),
            Err(err) => {
                warn::emit(WarnEvent {
                    code: err.code(),
                    stage: "import",
                    action: "insert",
                    session: &summary.session_key,
                    source: &summary.file,
                    reason: "insert-failed",
                    err: &err.to_string(),
                });
                SkipReason::Backend(err.to_string())
            }
        };
        record_skip(summary, index, reason);
    }
}

fn record_skip(summary: &mut FileImportSummary, index: u64, reason: SkipReason) {
    tracing::debug!(
        file = %summary.file,
        index,
        reason = reason.label(),
        "skipped entry: {reason}"
    );
    summary.skipped.record(&reason);
}

/// Import one transcript file. A read failure is reported in the summary,
/// never returned as an error.
pub fn import_transcript_file<I: VectorIndex>(
    store: &mut ConversationStore<I>,
    adapter: &TranscriptAdapter<'_>,
    path: &Path,
    session_key: &str,
    dry_run: bool,
) -> FileImportSummary {
    let mut summary = FileImportSummary::new(path, session_key);
    match adapter.adapt_jsonl_file(path, session_key) {
        Ok(entries) => store_entries(store, entries, &mut summary, dry_run),
        Err(err) => {
            warn::emit(WarnEvent {
                code: "FILE_READ_FAILED",
                stage: "import",
                action: "read-transcript",
                session: session_key,
                source: &path.display().to_string(),
                reason: "unreadable-file",
                err: &format!("{err:#}"),
            });
            summary.error = Some(format!("{err:#}"));
        }
    }
    tracing::info!(target: "convo::import", "{}", summary.render());
    summary
}

pub fn import_directory<I: VectorIndex>(
    store: &mut ConversationStore<I>,
    adapter: &TranscriptAdapter<'_>,
    dir: &Path,
    opts: &ImportOptions,
) -> Result<ImportSummary> {
    let candidates = list_transcripts(dir)?;
    let mut summary = ImportSummary {
        source: opts.source.label().to_string(),
        scanned_files: candidates.len(),
        dry_run: opts.dry_run,
        ..ImportSummary::default()
    };

    for path in candidates {
        if opts.source == SourceKind::Feishu
            && !sniff_prefix(&path, opts.sniff_bytes, FEISHU_SNIFF_MARKER)
        {
            continue;
        }
        summary.selected_files += 1;
        let session_key = session_key_for(&path);
        let file = import_transcript_file(store, adapter, &path, &session_key, opts.dry_run);
        summary.absorb(file);
    }

    summary.final_count = store.count()?;
    Ok(summary)
}

pub fn import_single_file<I: VectorIndex>(
    store: &mut ConversationStore<I>,
    adapter: &TranscriptAdapter<'_>,
    path: &Path,
    session_key: Option<&str>,
    dry_run: bool,
) -> Result<ImportSummary> {
    let session_key = session_key
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| session_key_for(path));
    let mut summary = ImportSummary {
        source: "file".to_string(),
        scanned_files: 1,
        selected_files: 1,
        dry_run,
        ..ImportSummary::default()
    };
    let file = import_transcript_file(store, adapter, path, &session_key, dry_run);
    summary.absorb(file);
    summary.final_count = store.count()?;
    Ok(summary)
}

pub fn import_history_export<I: VectorIndex>(
    store: &mut ConversationStore<I>,
    adapter: &TranscriptAdapter<'_>,
    path: &Path,
    session_key: Option<&str>,
    dry_run: bool,
) -> Result<ImportSummary> {
    let (session_key, entries) = adapter.adapt_history_file(path, session_key)?;
    let mut file = FileImportSummary::new(path, &session_key);
    store_entries(store, entries, &mut file, dry_run);
    tracing::info!(target: "convo::import", "{}", file.render());

    let mut summary = ImportSummary {
        source: "history".to_string(),
        scanned_files: 1,
        selected_files: 1,
        dry_run,
        ..ImportSummary::default()
    };
    summary.absorb(file);
    summary.final_count = store.count()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convo::canonical::Canonicalizer;
    use crate::convo::index::{IndexDocument, IndexHit, MetadataFilter};
    use crate::convo::local_index::LocalIndex;
    use crate::convo::noise::{NoiseFilter, NoiseProfile};
    use crate::convo::model::Sender;
    use crate::error::{ConvoError, ConvoResult};
    use tempfile::tempdir;

    const FEISHU_LINE: &str = r#"{"type":"message","message":{"role":"user","content":[{"type":"text","text":"ship it [message_id: om_abc123]"}],"timestamp":1700000000000}}"#;
    const REPLY_LINE: &str = r#"{"type":"message","message":{"role":"assistant","content":[{"type":"text","text":"on it"}],"timestamp":1700000001000}}"#;
    const NOISE_LINE: &str = r#"{"role":"assistant","content":[{"type":"text","text":"HEARTBEAT_OK"}],"timestamp":1700000002000}"#;
    const PLAIN_LINE: &str = r#"{"role":"user","content":"plain chat","timestamp":1700000003000}"#;

    fn store() -> ConversationStore<LocalIndex> {
        ConversationStore::new(LocalIndex::in_memory(64))
    }

    fn feishu_canonicalizer() -> Canonicalizer {
        Canonicalizer {
            noise: NoiseFilter::new(NoiseProfile::Feishu, &[]),
            ..Canonicalizer::default()
        }
    }

    fn opts(source: SourceKind) -> ImportOptions {
        ImportOptions {
            source,
            sniff_bytes: 5000,
            dry_run: false,
        }
    }

    #[test]
    fn directory_import_is_idempotent() {
        let tmp = tempdir().expect("tempdir");
        std::fs::write(
            tmp.path().join("s1.jsonl"),
            [FEISHU_LINE, REPLY_LINE, NOISE_LINE].join("\n"),
        )
        .expect("write");

        let canonicalizer = feishu_canonicalizer();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = store();

        let first = import_directory(&mut store, &adapter, tmp.path(), &opts(SourceKind::Feishu))
            .expect("import");
        assert_eq!(first.imported, 2);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.files[0].skipped.noise, 1);
        assert_eq!(first.final_count, 2);

        let second = import_directory(&mut store, &adapter, tmp.path(), &opts(SourceKind::Feishu))
            .expect("import");
        assert_eq!(second.imported, 0);
        assert_eq!(second.files[0].skipped.duplicate, 2);
        assert_eq!(second.final_count, 2);

        let first_msg = store.get("om_abc123").expect("get").expect("present");
        assert_eq!(first_msg.sender, Sender::Horse);
        assert_eq!(first_msg.session_key, "s1");
        assert!(store.get("s1_000001").expect("get").is_some());
    }

    #[test]
    fn feishu_source_skips_files_without_marker() {
        let tmp = tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("a.jsonl"), FEISHU_LINE).expect("write");
        std::fs::write(tmp.path().join("b.jsonl"), PLAIN_LINE).expect("write");
        std::fs::write(tmp.path().join("notes.txt"), FEISHU_LINE).expect("write");

        let canonicalizer = feishu_canonicalizer();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");

        let mut feishu = store();
        let summary = import_directory(&mut feishu, &adapter, tmp.path(), &opts(SourceKind::Feishu))
            .expect("import");
        assert_eq!(summary.scanned_files, 2);
        assert_eq!(summary.selected_files, 1);
        assert_eq!(summary.imported, 1);

        let mut all = store();
        let summary = import_directory(&mut all, &adapter, tmp.path(), &opts(SourceKind::All))
            .expect("import");
        assert_eq!(summary.selected_files, 2);
        assert_eq!(summary.imported, 2);
        assert_eq!(
            summary.files.iter().map(|f| f.file.as_str()).collect::<Vec<_>>(),
            vec!["a.jsonl", "b.jsonl"]
        );
    }

    #[test]
    fn dry_run_counts_without_writing() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("s1.jsonl");
        std::fs::write(&path, [PLAIN_LINE, REPLY_LINE].join("\n")).expect("write");

        let canonicalizer = Canonicalizer::default();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = store();
        let summary = import_single_file(&mut store, &adapter, &path, Some("custom"), true)
            .expect("import");
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.final_count, 0);
        assert_eq!(summary.files[0].session_key, "custom");

        import_single_file(&mut store, &adapter, &path, Some("custom"), false).expect("import");
        let again = import_single_file(&mut store, &adapter, &path, Some("custom"), true)
            .expect("import");
        assert_eq!(again.imported, 0);
        assert_eq!(again.files[0].skipped.duplicate, 2);
        assert_eq!(again.final_count, 2);
    }

    #[test]
    fn dry_run_sees_repeated_ids_within_a_file() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("s1.jsonl");
        std::fs::write(&path, [FEISHU_LINE, FEISHU_LINE].join("\n")).expect("write");

        let canonicalizer = feishu_canonicalizer();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = store();
        let dry = import_single_file(&mut store, &adapter, &path, None, true).expect("dry");
        let real = import_single_file(&mut store, &adapter, &path, None, false).expect("real");
        assert_eq!(dry.imported, real.imported);
        assert_eq!(dry.files[0].skipped, real.files[0].skipped);
        assert_eq!(real.files[0].skipped.duplicate, 1);
    }

    struct RejectingIndex;

    impl VectorIndex for RejectingIndex {
        fn add(&mut self, _: Vec<IndexDocument>) -> ConvoResult<()> {
            Err(ConvoError::Index("collection unavailable".into()))
        }
        fn get(&self, _: &[String]) -> ConvoResult<Vec<IndexDocument>> {
            Ok(Vec::new())
        }
        fn delete(&mut self, _: &[String]) -> ConvoResult<()> {
            Ok(())
        }
        fn query(&self, _: &str, _: usize, _: &MetadataFilter) -> ConvoResult<Vec<IndexHit>> {
            Ok(Vec::new())
        }
        fn get_all(&self, _: &MetadataFilter) -> ConvoResult<Vec<IndexDocument>> {
            Ok(Vec::new())
        }
        fn count(&self) -> ConvoResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn backend_failures_are_counted_and_the_run_continues() {
        let tmp = tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("a.jsonl"), [PLAIN_LINE, REPLY_LINE].join("\n"))
            .expect("write");
        std::fs::write(tmp.path().join("b.jsonl"), PLAIN_LINE).expect("write");

        let canonicalizer = Canonicalizer::default();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = ConversationStore::new(RejectingIndex);
        let summary = import_directory(&mut store, &adapter, tmp.path(), &opts(SourceKind::All))
            .expect("import");
        assert_eq!(summary.selected_files, 2);
        assert_eq!(summary.failed_files, 0);
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.files[0].skipped.backend, 2);
        assert_eq!(summary.files[1].skipped.backend, 1);
        assert!(summary.files.iter().all(|f| f.error.is_none()));
    }

    #[test]
    fn unreadable_file_is_reported_not_fatal() {
        let tmp = tempdir().expect("tempdir");
        let canonicalizer = Canonicalizer::default();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = store();
        let summary = import_single_file(
            &mut store,
            &adapter,
            &tmp.path().join("missing.jsonl"),
            None,
            false,
        )
        .expect("import");
        assert_eq!(summary.failed_files, 1);
        assert!(summary.files[0].error.is_some());
        assert_eq!(summary.files[0].session_key, "missing");
    }

    #[test]
    fn history_export_defaults_to_main_session() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("history.json");
        std::fs::write(
            &path,
            r#"{"messages":[{"role":"user","content":"hey","timestamp":1700000000000},{"role":"toolResult","content":"x"}]}"#,
        )
        .expect("write");

        let canonicalizer = Canonicalizer::default();
        let adapter = TranscriptAdapter::new(&canonicalizer, "feishu");
        let mut store = store();
        let summary =
            import_history_export(&mut store, &adapter, &path, None, false).expect("import");
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.files[0].skipped.role, 1);
        assert!(store.get("main_000000").expect("get").is_some());
    }

    #[test]
    fn skip_counts_total_and_absorb() {
        let mut counts = SkipCounts::default();
        counts.record(&SkipReason::NotAMessage);
        counts.record(&SkipReason::Duplicate("x".into()));
        let mut total = SkipCounts::default();
        total.absorb(&counts);
        total.absorb(&counts);
        assert_eq!(total.total(), 4);
        assert_eq!(total.not_message, 2);
    }
}
