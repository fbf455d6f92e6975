//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::pipeline::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the complete API router
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let app_state = AppState { orchestrator };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/models", get(handlers::list_models))
        .route("/api/v1/generate", post(handlers::generate))
        .route("/api/v1/generate/stream", post(handlers::generate_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use llm::{AdapterRegistry, AdapterRequest, OutputKind, ProviderAdapter, ProviderOutput};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Fixed(&'static str);

    #[async_trait]
    impl ProviderAdapter for Fixed {
        fn provider(&self) -> &str {
            "openai"
        }

        fn model(&self) -> &str {
            "gpt-4o"
        }

        fn output_kind(&self) -> OutputKind {
            OutputKind::Text
        }

        async fn generate(&self, _request: &AdapterRequest) -> llm::Result<ProviderOutput> {
            Ok(ProviderOutput::text(self.0, 300))
        }
    }

    fn router(answer: &'static str) -> Router {
        let adapters = AdapterRegistry::new().with_adapter(Arc::new(Fixed(answer)));
        let orchestrator = Orchestrator::builder(Arc::new(adapters))
            .without_cache()
            .build()
            .unwrap();
        create_router(Arc::new(orchestrator))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const ANSWER: &str = "```js index.js\nexport function hello() { return 'hi'; }\n```\n";

    #[tokio::test]
    async fn test_health() {
        let response = router(ANSWER)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["models"], 1);
    }

    #[tokio::test]
    async fn test_models_filter_available() {
        let response = router(ANSWER)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/models?available=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        let models = body["data"].as_array().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0]["model"], "gpt-4o");
        assert_eq!(models[0]["available"], true);
    }

    #[tokio::test]
    async fn test_generate_returns_archive() {
        let response = router(ANSWER)
            .oneshot(post_json(
                "/api/v1/generate",
                json!({"prompt": "Say hello", "models": ["gpt-4o"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["deliverable"], true);
        assert!(body["data"]["archive"].as_str().is_some());
        assert_eq!(body["data"]["app"]["files"][0]["path"], "index.js");
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_prompt() {
        let response = router(ANSWER)
            .oneshot(post_json(
                "/api/v1/generate",
                json!({"prompt": "", "models": ["gpt-4o"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_generate_unknown_model_is_bad_gateway() {
        let response = router(ANSWER)
            .oneshot(post_json(
                "/api/v1/generate",
                json!({"prompt": "Say hello", "models": ["nonexistent-model"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_stream_emits_events() {
        let response = router(ANSWER)
            .oneshot(post_json(
                "/api/v1/generate/stream",
                json!({"prompt": "Say hello", "models": ["gpt-4o"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("event: initializing"));
        assert!(text.contains("event: complete"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        for uri in ["/api/v1/generate", "/api/v1/generate/stream"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{\"prompt\": \"Say hello\", "))
                .unwrap();
            let response = router(ANSWER).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let body = body_json(response).await;
            assert_eq!(body["code"], "MALFORMED_BODY");
            assert_eq!(body["error"], "bad_request");
        }
    }
}
