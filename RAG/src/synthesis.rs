use crate::config::{RagConfig, SynthesisProvider};
use crate::gemini_service::GeminiService;
use crate::ollama_service::OllamaChat;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Vision-capable language model: prompt plus optional PNG in, answer out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn chat(&self, prompt: &str, image: Option<&[u8]>) -> Result<String>;
}

pub fn build_synthesizer(config: &RagConfig) -> Result<Arc<dyn Synthesizer>> {
    match config.synthesis_provider {
        SynthesisProvider::Ollama => Ok(Arc::new(OllamaChat::new(
            &config.ollama_url,
            &config.synthesis_model,
        )?)),
        SynthesisProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| anyhow!("GEMINI_API_KEY environment variable not set"))?;
            Ok(Arc::new(GeminiService::new(api_key, &config.synthesis_model)))
        }
    }
}
