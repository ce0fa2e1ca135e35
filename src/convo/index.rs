//! Boundary to the vector index collaborator.
//!
//! The collaborator owns embedding, nearest-neighbour ranking and physical
//! persistence. Everything above this trait treats its retrieval order as
//! arbitrary.

use crate::error::ConvoResult;
use serde::{Deserialize, Serialize};

/// Metadata persisted next to every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub timestamp: String,
    pub timestamp_epoch: f64,
    pub sender: String,
    pub session_key: String,
    pub channel: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub document: String,
    pub metadata: IndexMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub document: IndexDocument,
    pub distance: f64,
}

/// Conjunction of optional metadata predicates; the epoch range is inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub sender: Option<String>,
    pub session_key: Option<String>,
    pub epoch_range: Option<(f64, f64)>,
}

impl MetadataFilter {
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn epoch_between(mut self, start: f64, end: f64) -> Self {
        self.epoch_range = Some((start, end));
        self
    }

    pub fn matches(&self, meta: &IndexMetadata) -> bool {
        if let Some(sender) = &self.sender
            && meta.sender != *sender
        {
            return false;
        }
        if let Some(session_key) = &self.session_key
            && meta.session_key != *session_key
        {
            return false;
        }
        if let Some((start, end)) = self.epoch_range
            && !(start <= meta.timestamp_epoch && meta.timestamp_epoch <= end)
        {
            return false;
        }
        true
    }
}

pub trait VectorIndex {
    /// Add documents keyed by id. An id that already exists keeps its
    /// original document (first writer wins).
    fn add(&mut self, documents: Vec<IndexDocument>) -> ConvoResult<()>;

    fn get(&self, ids: &[String]) -> ConvoResult<Vec<IndexDocument>>;

    fn delete(&mut self, ids: &[String]) -> ConvoResult<()>;

    /// Up to `k` documents ranked by ascending distance to `text`.
    fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> ConvoResult<Vec<IndexHit>>;

    fn get_all(&self, filter: &MetadataFilter) -> ConvoResult<Vec<IndexDocument>>;

    fn count(&self) -> ConvoResult<usize>;
}
