use crate::config::{EmbeddingProvider, RagConfig};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maps text to fixed-length vectors. Identical input and model must give
/// identical output.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Embeds a batch, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding provider returned no vector"))
    }
}

pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &config.ollama_url,
            &config.embedding_model,
        )?)),
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(
            &config.embedding_model,
            config.embedding_dims,
        ))),
    }
}

/// Deterministic hashed bag-of-words embedding. Needs no model download.
pub struct HashEmbedder {
    model_name: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn create_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        for (word, count) in count_words(&tokenize(text)) {
            embedding[self.bucket(&word)] += count as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }

        embedding
    }

    fn bucket(&self, word: &str) -> usize {
        let digest = Sha256::digest(word.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.create_embedding(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| word.chars().count() > 2)
        .collect()
}

fn count_words(words: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in words {
        *counts.entry(word.clone()).or_insert(0) += 1;
    }
    counts
}

/// Calls a local Ollama instance's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_retries: 3,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse = response.json().await?;
                    if parsed.embeddings.len() != texts.len() {
                        bail!(
                            "Ollama returned {} embeddings for {} inputs",
                            parsed.embeddings.len(),
                            texts.len()
                        );
                    }
                    return Ok(parsed.embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        log::warn!("Ollama embed attempt {} failed with {}", attempt + 1, status);
                        last_err = Some(anyhow!("Ollama API error {}: {}", status, text));
                        continue;
                    }
                    bail!("Ollama API error {}: {}", status, text);
                }
                Err(e) => {
                    log::warn!("Ollama embed attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Ollama embedding failed after retries")))
    }
}

/// Cosine similarity in `[-1, 1]`. Empty, mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm1: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm2: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm1 < f32::EPSILON || norm2 < f32::EPSILON {
        0.0
    } else {
        (dot_product / (norm1 * norm2)).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalised() {
        let embedder = HashEmbedder::new("hash", 64);
        let a = embedder.embed_one("Canny edge detector").await.unwrap();
        let b = embedder.embed_one("Canny edge detector").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_score_higher() {
        let embedder = HashEmbedder::new("hash", 384);
        let query = embedder.embed_one("What is a Canny edge detector?").await.unwrap();
        let related = embedder
            .embed_one("The Canny edge detector finds edges with hysteresis.")
            .await
            .unwrap();
        let unrelated = embedder
            .embed_one("Install OpenCV using pip before starting.")
            .await
            .unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = HashEmbedder::new("hash", 32);
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let batch = embedder.embed(&texts).await.unwrap();
        assert_eq!(batch[1], embedder.embed_one("gamma delta").await.unwrap());
    }

    #[test]
    fn tokenizer_drops_short_words_and_punctuation() {
        assert_eq!(tokenize("A Canny-edge, is OK!"), vec!["cannyedge"]);
    }

    #[test]
    fn cosine_edge_cases() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn unreachable_ollama_is_an_error() {
        let mut embedder = OllamaEmbedder::new("http://127.0.0.1:9", "all-minilm").unwrap();
        embedder.max_retries = 0;
        let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Ollama connection error"));
    }
}
