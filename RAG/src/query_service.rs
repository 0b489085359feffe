use crate::context_assembler::ContextAssembler;
use crate::error::{RagError, RagResult};
use crate::models::QueryResult;
use crate::retriever::Retriever;
use crate::synthesis::Synthesizer;
use std::sync::Arc;
use std::time::Duration;

pub const NO_CONTEXT_ANSWER: &str =
    "I could not find relevant information in the book to answer your question.";

/// How an answer came about. Callers that only need the payload use
/// [`QueryService::answer_query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    NoContext,
    Synthesized,
    SynthesisFailed(String),
}

#[derive(Debug, Clone)]
pub struct QueryRun {
    pub result: QueryResult,
    pub outcome: QueryOutcome,
    pub image_attached: bool,
}

/// Answers one question: retrieve, assemble, ask the model.
pub struct QueryService {
    retriever: Retriever,
    assembler: ContextAssembler,
    synthesizer: Arc<dyn Synthesizer>,
    synthesis_timeout: Duration,
}

impl QueryService {
    pub fn new(
        retriever: Retriever,
        synthesizer: Arc<dyn Synthesizer>,
        synthesis_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            assembler: ContextAssembler::new(),
            synthesizer,
            synthesis_timeout,
        }
    }

    pub async fn answer_query(&self, query: &str) -> RagResult<QueryResult> {
        Ok(self.run(query).await?.result)
    }

    /// Retrieval errors propagate. A failing or slow language model does not:
    /// its error text becomes the answer and the sources are still returned.
    pub async fn run(&self, query: &str) -> RagResult<QueryRun> {
        let start_time = std::time::Instant::now();
        log::info!("Received query: {}", query);

        let chunks = self.retriever.retrieve(query).await?;
        if chunks.is_empty() {
            log::info!("No relevant chunks found, skipping synthesis");
            return Ok(QueryRun {
                result: QueryResult {
                    answer: NO_CONTEXT_ANSWER.to_string(),
                    sources: Vec::new(),
                },
                outcome: QueryOutcome::NoContext,
                image_attached: false,
            });
        }

        let assembled = self.assembler.assemble(query, &chunks).await;
        let image_attached = assembled.image.is_some();
        if let Some(path) = &assembled.image_path {
            log::info!("Attaching image {}", path);
        }

        let call = self
            .synthesizer
            .chat(&assembled.prompt, assembled.image.as_deref());
        let (answer, outcome) = match tokio::time::timeout(self.synthesis_timeout, call).await {
            Ok(Ok(answer)) => (answer, QueryOutcome::Synthesized),
            Ok(Err(e)) => self.degraded(format!("{e:#}")),
            Err(_) => self.degraded(format!(
                "no response within {}s",
                self.synthesis_timeout.as_secs()
            )),
        };

        log::info!(
            "Answered query with {} sources in {} ms",
            assembled.sources.len(),
            start_time.elapsed().as_millis()
        );

        Ok(QueryRun {
            result: QueryResult {
                answer,
                sources: assembled.sources,
            },
            outcome,
            image_attached,
        })
    }

    fn degraded(&self, reason: String) -> (String, QueryOutcome) {
        let err = RagError::SynthesisError(reason.clone());
        log::error!("{} (model {})", err, self.synthesizer.model_name());
        (
            format!("Error communicating with the language model: {reason}"),
            QueryOutcome::SynthesisFailed(reason),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding_service::{Embedder, HashEmbedder};
    use crate::memory_store::MemoryVectorStore;
    use crate::models::ChunkMetadata;
    use crate::vector_store::{Collection, IndexEntry, VectorStore};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Script {
        Reply(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct ScriptedSynthesizer {
        script: Script,
        calls: AtomicUsize,
        last_image: Mutex<Option<Vec<u8>>>,
    }

    impl ScriptedSynthesizer {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
                last_image: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Synthesizer for ScriptedSynthesizer {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _prompt: &str, image: Option<&[u8]>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_image.lock().unwrap() = image.map(|b| b.to_vec());
            match self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Fail(msg) => Err(anyhow!(msg)),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    async fn service_with(
        texts: &[(&str, u32, Option<String>)],
        synthesizer: Arc<ScriptedSynthesizer>,
        timeout: Duration,
    ) -> QueryService {
        let embedder = Arc::new(HashEmbedder::new("hash", 128));
        let store = Arc::new(MemoryVectorStore::new());
        let mut entries = Vec::new();
        for (i, (text, page, image)) in texts.iter().enumerate() {
            entries.push(IndexEntry {
                id: format!("text_{i}"),
                vector: embedder.embed_one(text).await.unwrap(),
                document: text.to_string(),
                metadata: ChunkMetadata {
                    source_page: *page,
                    image_path: image.clone(),
                },
            });
        }
        store.upsert_batch(Collection::Text, &entries).unwrap();
        let retriever = Retriever::new(embedder, store, 3);
        QueryService::new(retriever, synthesizer, timeout)
    }

    #[tokio::test]
    async fn answers_with_model_reply_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("page_2.png");
        std::fs::write(&image, b"png").unwrap();
        let synth = ScriptedSynthesizer::new(Script::Reply("Canny finds edges."));
        let service = service_with(
            &[
                ("Installing the toolkit", 1, None),
                ("The Canny edge detector uses hysteresis", 2, Some(image.to_string_lossy().into_owned())),
            ],
            synth.clone(),
            Duration::from_secs(5),
        )
        .await;

        let run = service.run("Canny edge detector").await.unwrap();
        assert_eq!(run.outcome, QueryOutcome::Synthesized);
        assert_eq!(run.result.answer, "Canny finds edges.");
        assert_eq!(run.result.sources[0].page, 2);
        assert_eq!(run.result.sources.len(), 2);
        assert!(run.image_attached);
        assert_eq!(synth.last_image.lock().unwrap().as_deref(), Some(&b"png"[..]));
    }

    #[tokio::test]
    async fn empty_index_skips_the_model() {
        let synth = ScriptedSynthesizer::new(Script::Reply("unused"));
        let service = service_with(&[], synth.clone(), Duration::from_secs(5)).await;

        let result = service.answer_query("anything").await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failure_degrades_to_error_answer() {
        let synth = ScriptedSynthesizer::new(Script::Fail("connection refused"));
        let service = service_with(&[("edges and blur", 4, None)], synth, Duration::from_secs(5)).await;

        let run = service.run("edges").await.unwrap();
        assert!(run
            .result
            .answer
            .starts_with("Error communicating with the language model:"));
        assert!(run.result.answer.contains("connection refused"));
        assert_eq!(run.result.sources[0].page, 4);
        assert!(matches!(run.outcome, QueryOutcome::SynthesisFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let synth = ScriptedSynthesizer::new(Script::Hang);
        let service = service_with(&[("edges and blur", 1, None)], synth, Duration::from_secs(2)).await;

        let run = service.run("edges").await.unwrap();
        assert!(matches!(run.outcome, QueryOutcome::SynthesisFailed(_)));
        assert!(run.result.answer.contains("no response within 2s"));
    }

    #[tokio::test]
    async fn missing_image_still_answers() {
        let synth = ScriptedSynthesizer::new(Script::Reply("ok"));
        let service = service_with(
            &[("edges and blur", 3, Some("/nonexistent/page_3.png".into()))],
            synth.clone(),
            Duration::from_secs(5),
        )
        .await;

        let run = service.run("edges").await.unwrap();
        assert_eq!(run.outcome, QueryOutcome::Synthesized);
        assert!(!run.image_attached);
        assert!(synth.last_image.lock().unwrap().is_none());
        assert_eq!(run.result.sources[0].image.as_deref(), Some("/nonexistent/page_3.png"));
    }
}
