use crate::error::{RagError, RagResult};
use crate::vector_store::{rank, Collection, IndexEntry, ScoredEntry, VectorStore};
use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};
use std::path::Path;
use std::sync::Mutex;

const META_TREE: &str = "meta";

/// Durable vector store backed by `sled`, one tree per collection.
///
/// Similarity search is a brute-force cosine scan, which is fine for a
/// single book. sled locks its directory, so a second process opening the
/// same path fails with `IndexUnavailable`.
pub struct SledVectorStore {
    db: Db,
    texts: Tree,
    images: Tree,
    meta: Tree,
    write_lock: Mutex<()>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    seq: u64,
    entry: IndexEntry,
}

impl SledVectorStore {
    pub fn open(path: impl AsRef<Path>) -> RagResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::index(format!("failed to create index directory {}: {e}", path.display()))
        })?;

        let db = sled::open(path)
            .map_err(|e| RagError::index(format!("failed to open index at {}: {e}", path.display())))?;
        let texts = open_tree(&db, Collection::Text.name())?;
        let images = open_tree(&db, Collection::Image.name())?;
        let meta = open_tree(&db, META_TREE)?;

        Ok(Self {
            db,
            texts,
            images,
            meta,
            write_lock: Mutex::new(()),
        })
    }

    fn tree(&self, collection: Collection) -> &Tree {
        match collection {
            Collection::Text => &self.texts,
            Collection::Image => &self.images,
        }
    }

    fn decode(bytes: &[u8]) -> RagResult<StoredEntry> {
        serde_json::from_slice(bytes)
            .map_err(|e| RagError::index(format!("corrupt index record: {e}")))
    }
}

fn open_tree(db: &Db, name: &str) -> RagResult<Tree> {
    db.open_tree(name)
        .map_err(|e| RagError::index(format!("failed to open collection {name}: {e}")))
}

fn storage_err(action: &str) -> impl Fn(sled::Error) -> RagError + '_ {
    move |e| RagError::index(format!("failed to {action}: {e}"))
}

impl VectorStore for SledVectorStore {
    fn reset(&self, collection: Collection) -> RagResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RagError::index("index write lock poisoned"))?;
        self.tree(collection)
            .clear()
            .map_err(storage_err("clear collection"))?;
        self.tree(collection)
            .flush()
            .map_err(storage_err("flush collection"))?;
        Ok(())
    }

    fn upsert_batch(&self, collection: Collection, entries: &[IndexEntry]) -> RagResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RagError::index("index write lock poisoned"))?;
        let tree = self.tree(collection);
        let mut batch = Batch::default();

        for entry in entries {
            let seq = match tree.get(entry.id.as_bytes()).map_err(storage_err("read entry"))? {
                Some(existing) => Self::decode(&existing)?.seq,
                None => self.db.generate_id().map_err(storage_err("allocate sequence"))?,
            };
            let bytes = serde_json::to_vec(&StoredEntry {
                seq,
                entry: entry.clone(),
            })
            .map_err(|e| RagError::index(format!("failed to encode entry {}: {e}", entry.id)))?;
            batch.insert(entry.id.as_bytes(), bytes);
        }

        tree.apply_batch(batch).map_err(storage_err("apply batch"))?;
        tree.flush().map_err(storage_err("flush batch"))?;
        Ok(())
    }

    fn query(&self, collection: Collection, vector: &[f32], k: usize) -> RagResult<Vec<ScoredEntry>> {
        let mut candidates = Vec::new();
        for item in self.tree(collection).iter() {
            let (_, value) = item.map_err(storage_err("read collection"))?;
            let stored = Self::decode(&value)?;
            candidates.push((stored.seq, stored.entry));
        }
        Ok(rank(candidates, vector, k))
    }

    fn count(&self, collection: Collection) -> RagResult<usize> {
        Ok(self.tree(collection).len())
    }

    fn contains(&self, collection: Collection, id: &str) -> RagResult<bool> {
        self.tree(collection)
            .contains_key(id.as_bytes())
            .map_err(storage_err("read entry"))
    }

    fn set_meta(&self, key: &str, value: &str) -> RagResult<()> {
        self.meta
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(storage_err("write metadata"))?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> RagResult<Option<String>> {
        let value = self.meta.get(key.as_bytes()).map_err(storage_err("read metadata"))?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn flush(&self) -> RagResult<()> {
        self.db.flush().map_err(storage_err("flush index"))?;
        Ok(())
    }
}
