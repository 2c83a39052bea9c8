//! HTTP surface: `POST /api/chat` and `GET /health`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::{Result, eyre};
use cybvector_core::DialogueController;
use cybvector_shared::{AppConfig, ChatRequest, ChatResponse};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    controller: Arc<DialogueController>,
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

pub(crate) fn router(controller: Arc<DialogueController>, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/api/chat", post(handler_chat))
        .route("/health", get(handler_health))
        .with_state(AppState { controller })
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind, serve until Ctrl-C, and prune idle sessions in the background.
pub(crate) async fn serve(controller: Arc<DialogueController>, config: &AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;

    let pruner = tokio::spawn(prune_sessions(
        Arc::clone(&controller),
        Duration::from_secs((config.sessions.ttl_secs / 2).max(1)),
    ));

    info!(addr = %addr, cors_permissive = config.server.cors_permissive, "listening");
    let app = router(controller, config.server.cors_permissive);
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pruner.abort();
    served.map_err(|e| eyre!("server error: {e}"))?;
    info!("shutdown complete");
    Ok(())
}

async fn prune_sessions(controller: Arc<DialogueController>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = controller.sessions().prune_expired().await;
        if removed > 0 {
            debug!(removed, "pruned idle sessions");
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handler_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    Json(state.controller.handle(request).await)
}

async fn handler_health(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.controller.sessions().len().await;
    Json(json!({ "status": "ok", "sessions": sessions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use cybvector_completion::{Completer, CompletionService};
    use cybvector_core::InMemorySessionStore;
    use cybvector_intel::{Entity, ReputationBackend, ReputationGateway, ReputationResult, Source};
    use tower::ServiceExt;

    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for EchoModel {
        async fn generate(&self, _system: &str, user: &str) -> cybvector_shared::Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(format!("echo: {user}"))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct OfflineBackend(Source);

    #[async_trait]
    impl ReputationBackend for OfflineBackend {
        fn source(&self) -> Source {
            self.0
        }

        async fn lookup(&self, _entity: &Entity) -> ReputationResult {
            ReputationResult::Unconfigured { source: self.0 }
        }
    }

    fn app(cors_permissive: bool) -> Router {
        let controller = DialogueController::new(
            Arc::new(InMemorySessionStore::new(16, Duration::from_secs(60))),
            ReputationGateway::new(
                Arc::new(OfflineBackend(Source::VirusTotal)),
                Arc::new(OfflineBackend(Source::AbuseIpDb)),
            ),
            Completer::new(Arc::new(EchoModel {
                prompts: Mutex::new(Vec::new()),
            })),
        );
        router(Arc::new(controller), cors_permissive)
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_mints_session_and_replies() {
        let response = app(true)
            .oneshot(chat_request(r#"{"message": "what is phishing?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["response"], "echo: what is phishing?");
        assert!(!body["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quiz_progresses_across_requests_with_same_session() {
        let app = app(true);

        let first = app
            .clone()
            .oneshot(chat_request(r#"{"message": "security hygiene", "session_id": "s1"}"#))
            .await
            .unwrap();
        let body = json_body(first).await;
        assert_eq!(body["session_id"], "s1");
        assert!(body["response"].as_str().unwrap().contains("(1/6)"));

        let second = app
            .oneshot(chat_request(r#"{"message": "yes", "session_id": "s1"}"#))
            .await
            .unwrap();
        let body = json_body(second).await;
        assert!(body["response"].as_str().unwrap().starts_with("Question 2/6:"));
    }

    #[tokio::test]
    async fn missing_message_is_empty_text() {
        let response = app(true).oneshot(chat_request("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response"], "echo: ");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let response = app(true).oneshot(chat_request("{not json")).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn health_reports_session_count() {
        let app = app(true);
        app.clone()
            .oneshot(chat_request(r#"{"message": "hi", "session_id": "a"}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok", "sessions": 1}));
    }

    #[tokio::test]
    async fn permissive_cors_allows_any_origin() {
        let request = Request::get("/health")
            .header(header::ORIGIN, "https://elsewhere.example")
            .body(Body::empty())
            .unwrap();

        let response = app(true).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );

        let request = Request::get("/health")
            .header(header::ORIGIN, "https://elsewhere.example")
            .body(Body::empty())
            .unwrap();
        let response = app(false).oneshot(request).await.unwrap();
        assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
