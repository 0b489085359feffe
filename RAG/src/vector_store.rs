use crate::embedding_service::cosine_similarity;
use crate::error::RagResult;
use crate::models::ChunkMetadata;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The two logical collections kept per ingestion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Text,
    Image,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Text => "book_texts",
            Collection::Image => "book_images",
        }
    }
}

/// One vector plus the document it was computed from and its back-pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// Persistent nearest-neighbour store.
///
/// Writers must be serialised per generation; concurrent readers are fine.
pub trait VectorStore: Send + Sync {
    /// Drops every entry of a collection.
    fn reset(&self, collection: Collection) -> RagResult<()>;

    /// Inserts or replaces entries by id. Either the whole batch lands or none of it.
    fn upsert_batch(&self, collection: Collection, entries: &[IndexEntry]) -> RagResult<()>;

    /// Top `k` entries by cosine similarity, best first, ties in insertion order.
    fn query(&self, collection: Collection, vector: &[f32], k: usize) -> RagResult<Vec<ScoredEntry>>;

    fn count(&self, collection: Collection) -> RagResult<usize>;

    fn contains(&self, collection: Collection, id: &str) -> RagResult<bool>;

    fn set_meta(&self, key: &str, value: &str) -> RagResult<()>;

    fn get_meta(&self, key: &str) -> RagResult<Option<String>>;

    fn flush(&self) -> RagResult<()>;
}

/// Scores `(insertion_seq, entry)` pairs and keeps the best `k`.
pub(crate) fn rank<I>(candidates: I, vector: &[f32], k: usize) -> Vec<ScoredEntry>
where
    I: IntoIterator<Item = (u64, IndexEntry)>,
{
    let mut scored: Vec<(u64, ScoredEntry)> = candidates
        .into_iter()
        .map(|(seq, entry)| {
            let score = cosine_similarity(vector, &entry.vector);
            (seq, ScoredEntry { entry, score })
        })
        .collect();

    scored.sort_by(|a, b| match b.1.score.total_cmp(&a.1.score) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    scored.truncate(k);
    scored.into_iter().map(|(_, scored)| scored).collect()
}
