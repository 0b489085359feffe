use serde::{Deserialize, Serialize};

/// One page of the source PDF after extraction, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "page")]
    pub page_number: u32,
    pub image_path: String,
    pub text_path: String,
}

/// A slice of one page's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub content: String,
    pub source_page: u32,
    pub image_path: String,
}

/// Payload stored next to every vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_page: u32,
    pub image_path: Option<String>,
}

/// A text chunk returned by the retriever, ranked by similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// A page image returned by the secondary image search.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHit {
    pub image_path: String,
    pub source_page: u32,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub page: u32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}
