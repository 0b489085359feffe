use crate::query_payload::QueryPayload;
use crate::rag_response::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use visual_rag::{QueryResult, QueryService};

#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
}

pub fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/query", post(query))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "Visual RAG API is running" }))
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryPayload>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let Json(payload) = payload?;
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let result = state.query_service.answer_query(query).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;
    use visual_rag::embedding_service::Embedder;
    use visual_rag::vector_store::{IndexEntry, ScoredEntry};
    use visual_rag::{
        ChunkMetadata, Collection, HashEmbedder, MemoryVectorStore, RagError, RagResult,
        Retriever, Synthesizer, VectorStore,
    };

    struct EchoModel;

    #[async_trait]
    impl Synthesizer for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, _prompt: &str, _image: Option<&[u8]>) -> anyhow::Result<String> {
            Ok("Canny is an edge detector.".to_string())
        }
    }

    struct LockedStore;

    impl VectorStore for LockedStore {
        fn reset(&self, _: Collection) -> RagResult<()> {
            Err(RagError::index("locked"))
        }
        fn upsert_batch(&self, _: Collection, _: &[IndexEntry]) -> RagResult<()> {
            Err(RagError::index("locked"))
        }
        fn query(&self, _: Collection, _: &[f32], _: usize) -> RagResult<Vec<ScoredEntry>> {
            Err(RagError::index("locked"))
        }
        fn count(&self, _: Collection) -> RagResult<usize> {
            Err(RagError::index("locked"))
        }
        fn contains(&self, _: Collection, _: &str) -> RagResult<bool> {
            Err(RagError::index("locked"))
        }
        fn set_meta(&self, _: &str, _: &str) -> RagResult<()> {
            Err(RagError::index("locked"))
        }
        fn get_meta(&self, _: &str) -> RagResult<Option<String>> {
            Err(RagError::index("locked"))
        }
        fn flush(&self) -> RagResult<()> {
            Err(RagError::index("locked"))
        }
    }

    async fn app_with(store: Arc<dyn VectorStore>) -> Router {
        let embedder = Arc::new(HashEmbedder::new("hash", 64));
        let retriever = Retriever::new(embedder, store, 3);
        let service = QueryService::new(retriever, Arc::new(EchoModel), Duration::from_secs(5));
        router(
            AppState {
                query_service: Arc::new(service),
            },
            cors_layer("http://localhost:3000").unwrap(),
        )
    }

    async fn indexed_app() -> Router {
        let embedder = HashEmbedder::new("hash", 64);
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert_batch(
                Collection::Text,
                &[IndexEntry {
                    id: "text_0".into(),
                    vector: embedder.embed_one("Canny edge detector").await.unwrap(),
                    document: "Canny edge detector".into(),
                    metadata: ChunkMetadata {
                        source_page: 2,
                        image_path: None,
                    },
                }],
            )
            .unwrap();
        app_with(store).await
    }

    fn post_query(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_running() {
        let app = app_with(Arc::new(MemoryVectorStore::new())).await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "Visual RAG API is running");
    }

    #[tokio::test]
    async fn query_returns_answer_and_sources() {
        let response = indexed_app()
            .await
            .oneshot(post_query(r#"{"query":"What is a Canny edge detector?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "Canny is an edge detector.");
        assert_eq!(body["sources"][0]["page"], 2);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let response = indexed_app().await.oneshot(post_query(r#"{"query":"   "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], "error");
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let response = indexed_app().await.oneshot(post_query("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(!body["error"].as_str().unwrap().is_empty());

        let response = indexed_app().await.oneshot(post_query(r#"{"question":"x"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["status"], "error");
    }

    #[tokio::test]
    async fn unavailable_index_maps_to_503() {
        let response = app_with(Arc::new(LockedStore))
            .await
            .oneshot(post_query(r#"{"query":"edges"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("locked"));
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = app_with(Arc::new(MemoryVectorStore::new())).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
