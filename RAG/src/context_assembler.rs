use crate::models::{RetrievedChunk, Source};
use std::path::Path;

/// Separates chunks in the context block: a line holding only `---`.
pub const CHUNK_DELIMITER: &str = "\n\n---\n\n";

/// Everything the language model receives for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub prompt: String,
    pub image: Option<Vec<u8>>,
    pub image_path: Option<String>,
    pub sources: Vec<Source>,
}

pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    pub async fn assemble(&self, query: &str, chunks: &[RetrievedChunk]) -> AssembledPrompt {
        let context = self.build_context(chunks);
        let prompt = self.build_prompt(query, &context);
        let (image_path, image) = match self.select_image(chunks).await {
            Some((path, bytes)) => (Some(path), Some(bytes)),
            None => (None, None),
        };

        AssembledPrompt {
            prompt,
            image,
            image_path,
            sources: self.build_sources(chunks),
        }
    }

    pub fn build_context(&self, chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_DELIMITER)
    }

    pub fn build_prompt(&self, query: &str, context: &str) -> String {
        format!(
            "You are an expert assistant for computer vision. Use the text context and the image (if provided) to answer.\n\
             Be technical and concise. If the context is not sufficient, say so.\n\n\
             --- TEXT CONTEXT ---\n\
             {context}\n\
             --------------------\n\n\
             USER'S QUESTION: {query}\n"
        )
    }

    /// Image of the top-ranked chunk's page only. A missing or unreadable
    /// file means no image, never an error.
    pub async fn select_image(&self, chunks: &[RetrievedChunk]) -> Option<(String, Vec<u8>)> {
        let path = chunks.first()?.metadata.image_path.clone()?;
        if !Path::new(&path).is_file() {
            log::warn!("Image {} not found, answering from text only", path);
            return None;
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Some((path, bytes)),
            Err(e) => {
                log::warn!("Could not read image {}: {}", path, e);
                None
            }
        }
    }

    /// One citation per retrieved chunk, in retrieval order.
    pub fn build_sources(&self, chunks: &[RetrievedChunk]) -> Vec<Source> {
        chunks
            .iter()
            .map(|chunk| Source {
                page: chunk.metadata.source_page,
                image: chunk.metadata.image_path.clone(),
            })
            .collect()
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}
