use crate::error::RagResult;
use crate::indexer::{IndexReport, IngestMode, Indexer};
use crate::page_extractor::PageExtractor;
use std::path::Path;

/// Offline ingestion: PDF to page artifacts to indexed vectors.
pub struct IngestPipeline {
    extractor: PageExtractor,
    indexer: Indexer,
}

impl IngestPipeline {
    pub fn new(extractor: PageExtractor, indexer: Indexer) -> Self {
        Self { extractor, indexer }
    }

    pub async fn run(&self, pdf_path: &Path, mode: IngestMode) -> RagResult<IndexReport> {
        let pages = self.extractor.extract(pdf_path)?;
        self.indexer.index(&pages, mode).await
    }

    /// Re-embeds pages from an existing manifest without touching the PDF.
    pub async fn reindex_from_manifest(&self, manifest: &Path, mode: IngestMode) -> RagResult<IndexReport> {
        let pages = PageExtractor::load_manifest(manifest)?;
        log::info!("Loaded {} pages from {}", pages.len(), manifest.display());
        self.indexer.index(&pages, mode).await
    }

    pub fn manifest_path(&self) -> std::path::PathBuf {
        self.extractor.manifest_path()
    }
}
