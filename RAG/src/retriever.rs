use crate::embedding_service::Embedder;
use crate::error::{RagError, RagResult};
use crate::models::{ImageHit, RetrievedChunk};
use crate::vector_store::{Collection, VectorStore};
use std::sync::Arc;

/// Nearest-neighbour search over the text-chunk index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    pub async fn retrieve(&self, query: &str) -> RagResult<Vec<RetrievedChunk>> {
        self.retrieve_k(query, self.top_k).await
    }

    /// Up to `k` chunks, most similar first. An empty or small index simply
    /// yields fewer results.
    pub async fn retrieve_k(&self, query: &str, k: usize) -> RagResult<Vec<RetrievedChunk>> {
        if k == 0 || self.store.count(Collection::Text)? == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_query(query).await?;
        let hits = self.store.query(Collection::Text, &vector, k)?;

        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk_id: hit.entry.id,
                content: hit.entry.document,
                metadata: hit.entry.metadata,
                score: hit.score,
            })
            .collect();

        log::info!("Found {} relevant chunks", chunks.len());
        Ok(chunks)
    }

    /// Similarity search over page images, keyed by their path descriptor.
    /// Answers do not use this; the image always comes from the top text hit.
    pub async fn search_images(&self, query: &str, k: usize) -> RagResult<Vec<ImageHit>> {
        if k == 0 || self.store.count(Collection::Image)? == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_query(query).await?;
        let hits = self.store.query(Collection::Image, &vector, k)?;

        Ok(hits
            .into_iter()
            .map(|hit| ImageHit {
                image_path: hit
                    .entry
                    .metadata
                    .image_path
                    .unwrap_or(hit.entry.document),
                source_page: hit.entry.metadata.source_page,
                score: hit.score,
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> RagResult<Vec<f32>> {
        self.embedder
            .embed_one(query)
            .await
            .map_err(|e| RagError::embedding("query", format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding_service::HashEmbedder;
    use crate::memory_store::MemoryVectorStore;
    use crate::models::ChunkMetadata;
    use crate::vector_store::IndexEntry;

    async fn seeded(texts: &[(&str, u32)]) -> (Arc<HashEmbedder>, Arc<MemoryVectorStore>) {
        let embedder = Arc::new(HashEmbedder::new("hash", 256));
        let store = Arc::new(MemoryVectorStore::new());
        let mut entries = Vec::new();
        for (i, (text, page)) in texts.iter().enumerate() {
            entries.push(IndexEntry {
                id: format!("text_{i}"),
                vector: embedder.embed_one(text).await.unwrap(),
                document: text.to_string(),
                metadata: ChunkMetadata {
                    source_page: *page,
                    image_path: Some(format!("images/page_{page}.png")),
                },
            });
        }
        store.upsert_batch(Collection::Text, &entries).unwrap();
        (embedder, store)
    }

    #[tokio::test]
    async fn returns_best_matches_in_descending_order() {
        let (embedder, store) = seeded(&[
            ("Histogram equalization improves contrast.", 1),
            ("The Canny edge detector uses hysteresis thresholds.", 2),
            ("Edge maps feed the contour finder.", 3),
        ])
        .await;
        let retriever = Retriever::new(embedder, store, 2);

        let chunks = retriever.retrieve("canny edge detector").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.source_page, 2);
        assert!(chunks[0].score >= chunks[1].score);
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let retriever = Retriever::new(
            Arc::new(HashEmbedder::new("hash", 16)),
            Arc::new(MemoryVectorStore::new()),
            3,
        );
        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
        assert!(retriever.search_images("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn small_index_returns_fewer_than_k() {
        let (embedder, store) = seeded(&[("only chunk here", 4)]).await;
        let retriever = Retriever::new(embedder, store, 3);
        assert_eq!(retriever.retrieve("chunk").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn image_search_reads_image_collection() {
        let embedder = Arc::new(HashEmbedder::new("hash", 64));
        let store = Arc::new(MemoryVectorStore::new());
        let path = "processed_book/images/page_7.png";
        store
            .upsert_batch(
                Collection::Image,
                &[IndexEntry {
                    id: "image_7".into(),
                    vector: embedder.embed_one(path).await.unwrap(),
                    document: path.into(),
                    metadata: ChunkMetadata {
                        source_page: 7,
                        image_path: Some(path.into()),
                    },
                }],
            )
            .unwrap();

        let retriever = Retriever::new(embedder, store, 3);
        let hits = retriever.search_images(path, 1).await.unwrap();
        assert_eq!(hits[0].source_page, 7);
        assert_eq!(hits[0].image_path, path);
    }
}
