use crate::chunker::Chunker;
use crate::embedding_service::Embedder;
use crate::error::{RagError, RagResult};
use crate::models::{Chunk, ChunkMetadata, Page};
use crate::vector_store::{Collection, IndexEntry, VectorStore};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use uuid::Uuid;

pub const META_GENERATION: &str = "generation";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Clear both collections and index everything.
    #[default]
    Replace,
    /// Keep existing entries and skip batches that are already fully stored.
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub generation: String,
    pub pages: usize,
    pub chunks: usize,
    pub batches_committed: usize,
    pub batches_skipped: usize,
    pub images: usize,
}

/// Embeds chunks and page images and writes them to the vector store.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunker: Chunker,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn index(&self, pages: &[Page], mode: IngestMode) -> RagResult<IndexReport> {
        log::info!("Starting embedding process...");
        let generation = Uuid::new_v4().to_string();

        // Unreadable pages must fail before the previous generation is cleared.
        let chunks = self.build_chunks(pages)?;
        log::info!("Split {} pages into {} chunks", pages.len(), chunks.len());

        if mode == IngestMode::Replace {
            self.store.reset(Collection::Text)?;
            self.store.reset(Collection::Image)?;
        }

        let mut committed = 0;
        let mut skipped = 0;
        for (index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let batch_number = index + 1;
            let ids = batch.iter().map(|c| c.chunk_id.as_str());
            if mode == IngestMode::Resume && self.already_stored(Collection::Text, ids)? {
                log::info!("Skipping batch {} of text chunks (already indexed).", batch_number);
                skipped += 1;
                continue;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embed_batch(&texts, &format!("text batch {batch_number}"))
                .await?;

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry {
                    id: chunk.chunk_id.clone(),
                    vector,
                    document: chunk.content.clone(),
                    metadata: ChunkMetadata {
                        source_page: chunk.source_page,
                        image_path: Some(chunk.image_path.clone()),
                    },
                })
                .collect();

            self.store.upsert_batch(Collection::Text, &entries)?;
            committed += 1;
            log::info!("Added batch {} of text chunks.", batch_number);
        }

        let images = self.index_images(pages).await?;

        self.store.set_meta(META_GENERATION, &generation)?;
        self.store.set_meta(META_EMBEDDING_MODEL, self.embedder.model_name())?;
        self.store.flush()?;

        log::info!(
            "Embedding process complete. Total text chunks: {}, Total images: {}",
            self.store.count(Collection::Text)?,
            self.store.count(Collection::Image)?
        );

        Ok(IndexReport {
            generation,
            pages: pages.len(),
            chunks: chunks.len(),
            batches_committed: committed,
            batches_skipped: skipped,
            images,
        })
    }

    /// Reads every page's text and splits it. Ids follow global chunk position,
    /// so the same input always produces the same ids.
    pub fn build_chunks(&self, pages: &[Page]) -> RagResult<Vec<Chunk>> {
        let per_page: Vec<Vec<String>> = pages
            .par_iter()
            .map(|page| -> RagResult<Vec<String>> {
                let text = fs::read_to_string(&page.text_path).map_err(|e| {
                    RagError::Extraction(format!(
                        "cannot read text for page {} at {}: {e}",
                        page.page_number, page.text_path
                    ))
                })?;
                Ok(self.chunker.split_text(&text))
            })
            .collect::<RagResult<_>>()?;

        let chunks = pages
            .iter()
            .zip(per_page)
            .flat_map(|(page, contents)| contents.into_iter().map(move |content| (page, content)))
            .enumerate()
            .map(|(position, (page, content))| Chunk {
                chunk_id: format!("text_{position}"),
                content,
                source_page: page.page_number,
                image_path: page.image_path.clone(),
            })
            .collect();

        Ok(chunks)
    }

    async fn index_images(&self, pages: &[Page]) -> RagResult<usize> {
        for (index, batch) in pages.chunks(self.batch_size).enumerate() {
            let descriptors: Vec<String> = batch.iter().map(|p| p.image_path.clone()).collect();
            let vectors = self
                .embed_batch(&descriptors, &format!("image batch {}", index + 1))
                .await?;

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(vectors)
                .map(|(page, vector)| IndexEntry {
                    id: format!("image_{}", page.page_number),
                    vector,
                    document: page.image_path.clone(),
                    metadata: ChunkMetadata {
                        source_page: page.page_number,
                        image_path: Some(page.image_path.clone()),
                    },
                })
                .collect();

            self.store.upsert_batch(Collection::Image, &entries)?;
        }
        Ok(pages.len())
    }

    async fn embed_batch(&self, texts: &[String], target: &str) -> RagResult<Vec<Vec<f32>>> {
        let vectors = self
            .embedder
            .embed(texts)
            .await
            .map_err(|e| RagError::embedding(target, format!("{e:#}")))?;

        if vectors.len() != texts.len() {
            return Err(RagError::embedding(
                target,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }

    fn already_stored<'a>(
        &self,
        collection: Collection,
        ids: impl Iterator<Item = &'a str>,
    ) -> RagResult<bool> {
        for id in ids {
            if !self.store.contains(collection, id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
