use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::embedding_service::{build_embedder, Embedder};
use crate::error::{RagError, RagResult};
use crate::indexer::{Indexer, META_EMBEDDING_MODEL};
use crate::ingest::IngestPipeline;
use crate::page_extractor::PageExtractor;
use crate::pdf_backend::PdfBackend;
use crate::query_service::QueryService;
use crate::retriever::Retriever;
use crate::sled_store::SledVectorStore;
use crate::synthesis::{build_synthesizer, Synthesizer};
use crate::vector_store::VectorStore;
use std::sync::Arc;
use std::time::Duration;

/// Owns the shared collaborators for one process: the store handle, the
/// embedder and the language model. Built once at startup and passed
/// to whoever needs it.
pub struct RagRuntime {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    query_service: Arc<QueryService>,
}

impl RagRuntime {
    pub fn new(config: RagConfig) -> RagResult<Self> {
        config.validate()?;
        log::info!("Opening index at {}", config.index_path.display());

        let store: Arc<dyn VectorStore> = Arc::new(SledVectorStore::open(&config.index_path)?);
        let embedder = build_embedder(&config).map_err(|e| RagError::config(format!("{e:#}")))?;
        let synthesizer =
            build_synthesizer(&config).map_err(|e| RagError::config(format!("{e:#}")))?;

        Self::with_components(config, embedder, store, synthesizer)
    }

    pub fn with_components(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> RagResult<Self> {
        if let Some(stored) = store.get_meta(META_EMBEDDING_MODEL)? {
            if stored != embedder.model_name() {
                log::warn!(
                    "Index was built with embedding model {} but {} is configured; re-ingest before querying",
                    stored,
                    embedder.model_name()
                );
            }
        }

        let retriever = Retriever::new(embedder.clone(), store.clone(), config.top_k);
        let query_service = Arc::new(QueryService::new(
            retriever,
            synthesizer,
            Duration::from_secs(config.synthesis_timeout_secs),
        ));

        Ok(Self {
            config,
            embedder,
            store,
            query_service,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    pub fn query_service(&self) -> Arc<QueryService> {
        self.query_service.clone()
    }

    pub fn ingest_pipeline(&self, backend: Arc<dyn PdfBackend>) -> RagResult<IngestPipeline> {
        let extractor = PageExtractor::new(backend, &self.config.output_dir)
            .with_dpi(self.config.render_dpi)
            .with_parallelism(self.config.parallel_extraction);
        let chunker = Chunker::new(self.config.chunk_size, self.config.chunk_overlap)?;
        let indexer = Indexer::new(
            self.embedder.clone(),
            self.store.clone(),
            chunker,
            self.config.batch_size,
        );
        Ok(IngestPipeline::new(extractor, indexer))
    }

    /// Flushes the index so nothing acknowledged is lost on exit.
    pub fn shutdown(&self) -> RagResult<()> {
        log::info!("Flushing index before shutdown");
        self.store.flush()
    }
}
