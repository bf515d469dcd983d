//! Axum-based gateway: serves the chat test UI and the session/chat JSON API.
//! Each chat turn forwards the prompt to the remote agent endpoint and stores
//! the normalized result on the session state bag.

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use harness_agent::AgentRuntimeClient;
use harness_core::{CoreConfig, NormalizedResponse, SessionState};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fixed reply substituted for the answer text when the remote call fails.
/// The turn is still recorded as a normal assistant reply.
pub(crate) const AGENT_FAILURE_REPLY: &str =
    "An error occurred while contacting the agent. Please try again later.";

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[harness-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(CoreConfig::load().expect("load CoreConfig"));
    if config.agent_id.is_empty() {
        tracing::warn!(
            target: "harness::gateway",
            "HARNESS__AGENT_ID is not set; agent invocations will fail at the remote call"
        );
    }

    let agent = Arc::new(AgentRuntimeClient::from_config(&config));
    let app = build_app(AppState {
        config: Arc::clone(&config),
        sessions: Arc::new(DashMap::new()),
        agent,
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.ui_title, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

fn assets_root_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &axum::http::HeaderValue, _| {
                let s = origin.to_str().unwrap_or("");
                let port = s
                    .split(':')
                    .last()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(0);
                (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    let serve_dir = ServeDir::new(assets_root_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/v1/status", get(status))
        .route("/api/v1/session", post(create_session))
        .route("/api/v1/session/:session_id", get(get_session))
        .route("/api/v1/session/:session_id/reset", post(reset_session))
        .route("/api/v1/chat", post(chat))
        .with_state(state)
        .fallback_service(serve_dir)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    /// session_id -> state bag. Written only by the handlers below, after the
    /// remote call has returned.
    pub(crate) sessions: Arc<DashMap<String, SessionState>>,
    pub(crate) agent: Arc<AgentRuntimeClient>,
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /v1/status – UI identity and the configured agent/alias identifiers.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ui_title": state.config.ui_title,
        "ui_icon": state.config.ui_icon,
        "agent_id": state.config.agent_id,
        "agent_alias_id": state.config.agent_alias_id,
    }))
}

/// POST /api/v1/session – creates a fresh session and returns its state bag.
async fn create_session(State(state): State<AppState>) -> Json<SessionState> {
    let session = SessionState::new();
    state
        .sessions
        .insert(session.session_id.clone(), session.clone());
    tracing::info!(target: "harness::gateway", session_id = %session.session_id, "session created");
    Json(session)
}

/// GET /api/v1/session/:session_id – current transcript and side-panel data.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionState>, StatusCode> {
    state
        .sessions
        .get(&session_id)
        .map(|entry| Json(entry.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// POST /api/v1/session/:session_id/reset – discards the session state bag
/// and returns a reinitialized one with a fresh identifier. Resetting an id
/// the gateway no longer knows still yields a fresh session.
async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionState> {
    state.sessions.remove(&session_id);
    let fresh = SessionState::new();
    state
        .sessions
        .insert(fresh.session_id.clone(), fresh.clone());
    tracing::info!(
        target: "harness::gateway",
        old_session_id = %session_id,
        session_id = %fresh.session_id,
        "session reset"
    );
    Json(fresh)
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    session_id: String,
    prompt: String,
}

/// POST /api/v1/chat – forwards one user message to the agent, blocks until
/// the remote stream is exhausted, and records the exchange. A failed remote
/// call is logged once and surfaced as the fixed reply with empty citations
/// and trace; the HTTP status is still 200.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<NormalizedResponse>, StatusCode> {
    {
        let mut session = state
            .sessions
            .get_mut(&req.session_id)
            .ok_or(StatusCode::NOT_FOUND)?;
        session.push_user(&req.prompt);
        // Guard dropped before the remote call; it must not be held across
        // the await.
    }

    let result = state
        .agent
        .invoke_agent(
            &state.config.agent_id,
            &state.config.agent_alias_id,
            &req.session_id,
            &req.prompt,
        )
        .await;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                target: "harness::gateway",
                session_id = %req.session_id,
                error = %e,
                "agent invocation failed"
            );
            NormalizedResponse {
                output_text: AGENT_FAILURE_REPLY.to_string(),
                ..Default::default()
            }
        }
    };

    if let Some(mut session) = state.sessions.get_mut(&req.session_id) {
        session.record_reply(response.clone());
    }
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::IntoResponse;
    use tower::ServiceExt;

    fn test_config(runtime_endpoint: &str) -> CoreConfig {
        CoreConfig {
            ui_title: "Test Harness".to_string(),
            ui_icon: None,
            port: 8001,
            agent_id: "AGENT1".to_string(),
            agent_alias_id: "TSTALIASID".to_string(),
            runtime_endpoint: runtime_endpoint.to_string(),
            api_key: None,
        }
    }

    fn test_app(runtime_endpoint: &str) -> (Router, AppState) {
        let config = Arc::new(test_config(runtime_endpoint));
        let state = AppState {
            config: Arc::clone(&config),
            sessions: Arc::new(DashMap::new()),
            agent: Arc::new(AgentRuntimeClient::from_config(&config)),
        };
        (build_app(state.clone()), state)
    }

    async fn json_body(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let (app, _) = test_app("http://127.0.0.1:9");
        let res = app.oneshot(get_req("/api/v1/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_returns_ui_identity() {
        let (app, _) = test_app("http://127.0.0.1:9");
        let res = app.oneshot(get_req("/v1/status")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["ui_title"], "Test Harness");
        assert_eq!(json["agent_id"], "AGENT1");
        assert_eq!(json["agent_alias_id"], "TSTALIASID");
    }

    #[tokio::test]
    async fn test_create_session_returns_empty_state() {
        let (app, state) = test_app("http://127.0.0.1:9");
        let res = app
            .oneshot(post_json("/api/v1/session", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        let session_id = json["session_id"].as_str().unwrap();
        assert!(!session_id.is_empty());
        assert_eq!(json["messages"], serde_json::json!([]));
        assert_eq!(json["citations"], serde_json::json!([]));
        assert_eq!(json["trace"], serde_json::json!({}));
        assert!(state.sessions.contains_key(session_id));
    }

    #[tokio::test]
    async fn test_reset_twice_yields_empty_state_and_distinct_ids() {
        let (app, state) = test_app("http://127.0.0.1:9");
        let first = SessionState::new();
        let first_id = first.session_id.clone();
        state.sessions.insert(first_id.clone(), first);

        let res = app
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/session/{}/reset", first_id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let second = json_body(res).await;
        let second_id = second["session_id"].as_str().unwrap().to_string();
        assert_ne!(second_id, first_id);
        assert_eq!(second["messages"], serde_json::json!([]));

        let res = app
            .oneshot(post_json(
                &format!("/api/v1/session/{}/reset", second_id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        let third = json_body(res).await;
        let third_id = third["session_id"].as_str().unwrap();
        assert_ne!(third_id, second_id);
        assert_eq!(third["messages"], serde_json::json!([]));
        assert_eq!(third["citations"], serde_json::json!([]));
        assert_eq!(third["trace"], serde_json::json!({}));
        assert!(!state.sessions.contains_key(&first_id));
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_not_found() {
        let (app, _) = test_app("http://127.0.0.1:9");
        let res = app
            .oneshot(get_req("/api/v1/session/no-such-session"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_unknown_session_is_not_found() {
        let (app, _) = test_app("http://127.0.0.1:9");
        let res = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"session_id": "no-such-session", "prompt": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_failure_substitutes_fixed_reply() {
        // Discard port: the remote call fails with a transport error.
        let (app, state) = test_app("http://127.0.0.1:9");
        let session = SessionState::new();
        let session_id = session.session_id.clone();
        state.sessions.insert(session_id.clone(), session);

        let res = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"session_id": session_id, "prompt": "What is the return policy?"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["output_text"], AGENT_FAILURE_REPLY);
        assert_eq!(json["citations"], serde_json::json!([]));
        assert_eq!(json["trace"], serde_json::json!({}));

        // The turn is still recorded as a normal assistant reply.
        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, AGENT_FAILURE_REPLY);
        assert!(session.citations.is_empty());
        assert!(session.trace.is_empty());
    }

    #[tokio::test]
    async fn test_chat_records_normalized_exchange() {
        // Mock upstream speaking the SSE event protocol.
        let body = concat!(
            "data: {\"chunk\":{\"text\":\"Returns are accepted within 30 days%[1]%\",",
            "\"attribution\":{\"citations\":[{\"location\":\"s3://docs/policy.pdf\"}]}}}\n",
            "data: {\"chunk\":{\"text\":\" for unused items.\"}}\n",
            "data: {\"trace\":{\"orchestrationTrace\":{\"traceId\":\"t-1\"}}}\n",
        );
        let upstream = Router::new().route(
            "/agents/:agent_id/agentAliases/:alias_id/sessions/:session_id/text",
            post(move || async move {
                (
                    [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
                    body,
                )
                    .into_response()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let (app, state) = test_app(&base_url);
        let session = SessionState::new();
        let session_id = session.session_id.clone();
        state.sessions.insert(session_id.clone(), session);

        let res = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"session_id": session_id, "prompt": "What is the return policy?"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(
            json["output_text"],
            "Returns are accepted within 30 days[1] for unused items.\n\nCitations:\n[1] s3://docs/policy.pdf"
        );

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.citations.len(), 1);
        assert_eq!(session.trace.len(), 1);
    }
}
