use crate::synthesis::Synthesizer;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat with a local Ollama model such as `llava`.
pub struct OllamaChat {
    client: Client,
    url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build Ollama HTTP client")?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str, image: Option<&[u8]>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: image.map(|bytes| STANDARD.encode(bytes)).into_iter().collect(),
            }],
            stream: false,
        }
    }
}

#[async_trait]
impl Synthesizer for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        let request = self.build_request(prompt, image);

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("is Ollama running at {}?", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Ollama returned {}: {}", status, error_text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse Ollama chat response")?;
        Ok(parsed.message.content)
    }
}
