use crate::error::{RagError, RagResult};
use crate::vector_store::{rank, Collection, IndexEntry, ScoredEntry, VectorStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store for tests and throwaway runs. Nothing survives the process.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<Collection, Vec<IndexEntry>>>,
    meta: RwLock<HashMap<String, String>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection in insertion order.
    pub fn entries(&self, collection: Collection) -> RagResult<Vec<IndexEntry>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }
}

fn poisoned<T>(_: T) -> RagError {
    RagError::index("memory store lock poisoned")
}

impl VectorStore for MemoryVectorStore {
    fn reset(&self, collection: Collection) -> RagResult<()> {
        self.collections.write().map_err(poisoned)?.remove(&collection);
        Ok(())
    }

    fn upsert_batch(&self, collection: Collection, entries: &[IndexEntry]) -> RagResult<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let stored = collections.entry(collection).or_default();
        for entry in entries {
            match stored.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }
        Ok(())
    }

    fn query(&self, collection: Collection, vector: &[f32], k: usize) -> RagResult<Vec<ScoredEntry>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let stored = match collections.get(&collection) {
            Some(stored) => stored,
            None => return Ok(Vec::new()),
        };
        let candidates = stored
            .iter()
            .enumerate()
            .map(|(seq, entry)| (seq as u64, entry.clone()));
        Ok(rank(candidates, vector, k))
    }

    fn count(&self, collection: Collection) -> RagResult<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(&collection).map_or(0, Vec::len))
    }

    fn contains(&self, collection: Collection, id: &str) -> RagResult<bool> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(&collection)
            .is_some_and(|stored| stored.iter().any(|entry| entry.id == id)))
    }

    fn set_meta(&self, key: &str, value: &str) -> RagResult<()> {
        self.meta
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> RagResult<Option<String>> {
        Ok(self.meta.read().map_err(poisoned)?.get(key).cloned())
    }

    fn flush(&self) -> RagResult<()> {
        Ok(())
    }
}
