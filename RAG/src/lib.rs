pub mod chunker;
pub mod config;
pub mod context_assembler;
pub mod embedding_service;
pub mod error;
pub mod gemini_service;
pub mod indexer;
pub mod ingest;
pub mod memory_store;
pub mod models;
pub mod ollama_service;
pub mod page_extractor;
pub mod pdf_backend;
pub mod query_service;
pub mod retriever;
pub mod runtime;
pub mod sled_store;
pub mod synthesis;
pub mod vector_store;

pub use chunker::Chunker;
pub use config::RagConfig;
pub use embedding_service::{Embedder, HashEmbedder, OllamaEmbedder};
pub use error::{RagError, RagResult};
pub use gemini_service::GeminiService;
pub use indexer::{IndexReport, IngestMode, Indexer};
pub use ingest::IngestPipeline;
pub use memory_store::MemoryVectorStore;
pub use models::*;
pub use ollama_service::OllamaChat;
pub use page_extractor::PageExtractor;
pub use pdf_backend::{PdfBackend, PopplerBackend};
pub use query_service::{QueryOutcome, QueryService};
pub use retriever::Retriever;
pub use runtime::RagRuntime;
pub use sled_store::SledVectorStore;
pub use synthesis::Synthesizer;
pub use vector_store::{Collection, VectorStore};
