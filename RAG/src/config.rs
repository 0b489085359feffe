use crate::error::{RagError, RagResult};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Ollama,
    /// Local hashed bag-of-words, no network.
    Hash,
}

impl FromStr for EmbeddingProvider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            other => Err(RagError::config(format!(
                "unknown EMBEDDING_PROVIDER `{other}` (expected `ollama` or `hash`)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisProvider {
    Ollama,
    Gemini,
}

impl FromStr for SynthesisProvider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(RagError::config(format!(
                "unknown SYNTHESIS_PROVIDER `{other}` (expected `ollama` or `gemini`)"
            ))),
        }
    }
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub pdf_path: PathBuf,
    pub output_dir: PathBuf,
    pub index_path: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub render_dpi: u32,
    pub parallel_extraction: bool,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub ollama_url: String,
    pub synthesis_provider: SynthesisProvider,
    pub synthesis_model: String,
    pub gemini_api_key: Option<String>,
    pub synthesis_timeout_secs: u64,
    pub api_bind: String,
    pub cors_origin: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::from("book/book.pdf"),
            output_dir: PathBuf::from("processed_book"),
            index_path: PathBuf::from("index_db"),
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 150,
            batch_size: 100,
            render_dpi: 150,
            parallel_extraction: false,
            embedding_provider: EmbeddingProvider::Ollama,
            embedding_model: "all-minilm".to_string(),
            embedding_dims: 384,
            ollama_url: "http://localhost:11434".to_string(),
            synthesis_provider: SynthesisProvider::Ollama,
            synthesis_model: "llava".to_string(),
            gemini_api_key: None,
            synthesis_timeout_secs: 120,
            api_bind: "0.0.0.0:8000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl RagConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> RagResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> RagResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            pdf_path: get("PDF_PATH").map(PathBuf::from).unwrap_or(defaults.pdf_path),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            index_path: get("INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            top_k: parse_or(get("TOP_K"), "TOP_K", defaults.top_k)?,
            chunk_size: parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            batch_size: parse_or(get("BATCH_SIZE"), "BATCH_SIZE", defaults.batch_size)?,
            render_dpi: parse_or(get("RENDER_DPI"), "RENDER_DPI", defaults.render_dpi)?,
            parallel_extraction: parse_or(
                get("PARALLEL_EXTRACTION"),
                "PARALLEL_EXTRACTION",
                defaults.parallel_extraction,
            )?,
            embedding_provider: match get("EMBEDDING_PROVIDER") {
                Some(v) => v.parse()?,
                None => defaults.embedding_provider,
            },
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dims: parse_or(get("EMBEDDING_DIMS"), "EMBEDDING_DIMS", defaults.embedding_dims)?,
            ollama_url: get("OLLAMA_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_url),
            synthesis_provider: match get("SYNTHESIS_PROVIDER") {
                Some(v) => v.parse()?,
                None => defaults.synthesis_provider,
            },
            synthesis_model: get("SYNTHESIS_MODEL").unwrap_or(defaults.synthesis_model),
            gemini_api_key: get("GEMINI_API_KEY"),
            synthesis_timeout_secs: parse_or(
                get("SYNTHESIS_TIMEOUT_SECS"),
                "SYNTHESIS_TIMEOUT_SECS",
                defaults.synthesis_timeout_secs,
            )?,
            api_bind: get("API_BIND").unwrap_or(defaults.api_bind),
            cors_origin: get("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RagResult<()> {
        if self.top_k == 0 {
            return Err(RagError::config("TOP_K must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(RagError::config("CHUNK_SIZE must be at least 1"));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(RagError::config(format!(
                "CHUNK_OVERLAP ({}) must not exceed CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(RagError::config("BATCH_SIZE must be at least 1"));
        }
        if self.embedding_dims == 0 {
            return Err(RagError::config("EMBEDDING_DIMS must be at least 1"));
        }
        if self.synthesis_provider == SynthesisProvider::Gemini && self.gemini_api_key.is_none() {
            return Err(RagError::config(
                "GEMINI_API_KEY environment variable not set",
            ));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> RagResult<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RagError::config(format!("{key} has an invalid value `{raw}`"))),
        None => Ok(default),
    }
}
