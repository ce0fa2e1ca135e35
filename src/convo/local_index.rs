use crate::convo::index::{IndexDocument, IndexHit, MetadataFilter, VectorIndex};
use crate::error::{ConvoError, ConvoResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_DIMENSIONS: usize = 256;

#[derive(Debug, Clone)]
struct IndexedEntry {
    document: IndexDocument,
    embedding: Vec<f32>,
}

/// Single-process vector index backed by an append-only JSONL log.
///
/// Embeddings are hashed bags of tokens, recomputed on load rather than
/// persisted. Distances are cosine distances in `[0, 2]`.
#[derive(Debug)]
pub struct LocalIndex {
    path: Option<PathBuf>,
    dimensions: usize,
    entries: HashMap<String, IndexedEntry>,
}

fn index_err(path: &Path, action: &str, err: impl std::fmt::Display) -> ConvoError {
    ConvoError::Index(format!("failed to {action} {}: {err}", path.display()))
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3040..=0x30FF      // kana
        | 0x3400..=0x4DBF    // CJK ext A
        | 0x4E00..=0x9FFF    // CJK unified
        | 0xAC00..=0xD7AF    // hangul
        | 0xF900..=0xFAFF)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if is_cjk(ch) {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(ch.to_string());
        } else if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn embed_text(text: &str, dimensions: usize) -> Vec<f32> {
    let dimensions = dimensions.max(1);
    let mut vector = vec![0.0f32; dimensions];
    for token in tokenize(text) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(head);
        let bucket = (hash % dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    let magnitude = vector.iter().map(|c| c * c).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for component in &mut vector {
            *component /= magnitude;
        }
    }
    vector
}

fn cosine_distance(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() {
        return 1.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(l, r)| l * r).sum();
    if left.iter().all(|c| *c == 0.0) || right.iter().all(|c| *c == 0.0) {
        return 1.0;
    }
    (1.0 - f64::from(dot)).clamp(0.0, 2.0)
}

fn read_log(path: &Path) -> ConvoResult<Vec<IndexDocument>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).map_err(|err| index_err(path, "read", err))?;
    let mut out = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let doc: IndexDocument = serde_json::from_str(trimmed).map_err(|err| {
            index_err(path, &format!("parse line {} of", line_no + 1), err)
        })?;
        out.push(doc);
    }
    Ok(out)
}

fn append_log(path: &Path, documents: &[&IndexDocument]) -> ConvoResult<()> {
    if documents.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| index_err(parent, "create", err))?;
    }
    let mut out = String::new();
    for doc in documents {
        out.push_str(&serde_json::to_string(doc)?);
        out.push('\n');
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| index_err(path, "open", err))?;
    file.write_all(out.as_bytes())
        .map_err(|err| index_err(path, "append to", err))?;
    Ok(())
}

fn write_log(path: &Path, documents: &[&IndexDocument]) -> ConvoResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| index_err(parent, "create", err))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|err| index_err(parent, "stage in", err))?;
    for doc in documents {
        let line = serde_json::to_string(doc)?;
        writeln!(tmp, "{line}").map_err(|err| index_err(tmp.path(), "write", err))?;
    }
    tmp.persist(path)
        .map_err(|err| index_err(path, "replace", err.error))?;
    Ok(())
}

impl LocalIndex {
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            path: None,
            dimensions: dimensions.max(1),
            entries: HashMap::new(),
        }
    }

    /// Open (or lazily create) the log at `path` and replay it.
    pub fn open(path: &Path, dimensions: usize) -> ConvoResult<Self> {
        let mut index = Self::in_memory(dimensions);
        for document in read_log(path)? {
            index.insert_entry(document);
        }
        index.path = Some(path.to_path_buf());
        Ok(index)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn insert_entry(&mut self, document: IndexDocument) -> bool {
        if self.entries.contains_key(&document.id) {
            return false;
        }
        let embedding = embed_text(&document.document, self.dimensions);
        self.entries.insert(
            document.id.clone(),
            IndexedEntry {
                document,
                embedding,
            },
        );
        true
    }
}

impl VectorIndex for LocalIndex {
    fn add(&mut self, documents: Vec<IndexDocument>) -> ConvoResult<()> {
        let mut added = Vec::new();
        for document in documents {
            let id = document.id.clone();
            if self.insert_entry(document) {
                added.push(id);
            }
        }
        if let Some(path) = &self.path {
            let docs = added
                .iter()
                .filter_map(|id| self.entries.get(id))
                .map(|e| &e.document)
                .collect::<Vec<_>>();
            if let Err(err) = append_log(path, &docs) {
                for id in &added {
                    self.entries.remove(id);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn get(&self, ids: &[String]) -> ConvoResult<Vec<IndexDocument>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| e.document.clone())
            .collect())
    }

    fn delete(&mut self, ids: &[String]) -> ConvoResult<()> {
        let removed = ids
            .iter()
            .filter_map(|id| self.entries.remove(id).map(|e| (id.clone(), e)))
            .collect::<Vec<_>>();
        if removed.is_empty() {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let mut docs = self.entries.values().map(|e| &e.document).collect::<Vec<_>>();
            docs.sort_by(|a, b| a.id.cmp(&b.id));
            if let Err(err) = write_log(path, &docs) {
                for (id, entry) in removed {
                    self.entries.insert(id, entry);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> ConvoResult<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = embed_text(text, self.dimensions);
        let mut hits = self
            .entries
            .values()
            .filter(|e| filter.matches(&e.document.metadata))
            .map(|e| IndexHit {
                document: e.document.clone(),
                distance: cosine_distance(&query, &e.embedding),
            })
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn get_all(&self, filter: &MetadataFilter) -> ConvoResult<Vec<IndexDocument>> {
        Ok(self
            .entries
            .values()
            .filter(|e| filter.matches(&e.document.metadata))
            .map(|e| e.document.clone())
            .collect())
    }

    fn count(&self) -> ConvoResult<usize> {
        Ok(self.entries.len())
    }
}
