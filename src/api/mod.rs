//! WebSocket + REST surface for the dialogue engine.
//!
//! Structured data only — rendering belongs entirely to the web client.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{DialogueEngine, TurnEvent};
use crate::error::EngineError;
use crate::history::SessionSummary;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DialogueEngine>,
}

/// Build the Axum router with the turn, query, and live-feed routes.
pub fn engine_routes(engine: Arc<DialogueEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/api/turns", post(process_turn))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/search", get(search_sessions))
        .route("/api/sessions/{id}/history", get(get_history))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/archive", post(archive_session))
        .route("/api/analytics", get(analytics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── WebSocket messages ──────────────────────────────────────────────

/// Frames sent to live-feed clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    /// Sent on connect and after a lagged client resyncs.
    SessionsSync { sessions: Vec<SessionSummary> },
    Turn {
        session_id: Uuid,
        state: crate::dialogue::ConversationState,
        intent: String,
        tone: String,
    },
    SessionReset { session_id: Uuid },
    SessionArchived { session_id: Uuid },
}

impl From<TurnEvent> for WsMessage {
    fn from(event: TurnEvent) -> Self {
        match event {
            TurnEvent::Turn {
                session_id,
                state,
                intent,
                tone,
                ..
            } => Self::Turn {
                session_id,
                state,
                intent,
                tone,
            },
            TurnEvent::SessionReset { session_id } => Self::SessionReset { session_id },
            TurnEvent::SessionArchived { session_id } => Self::SessionArchived { session_id },
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "trip-assist"
    }))
}

// ── WebSocket ───────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Live feed client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.engine))
}

async fn handle_socket(mut socket: WebSocket, engine: Arc<DialogueEngine>) {
    info!("Live feed client connected");

    // Sync current session summaries on connect.
    let sync = WsMessage::SessionsSync {
        sessions: engine.session_summaries().await,
    };
    if let Ok(json) = serde_json::to_string(&sync) {
        if socket.send(Message::Text(json.into())).await.is_err() {
            warn!("Failed to send initial sync, client disconnected");
            return;
        }
    }

    let mut rx = engine.subscribe();

    loop {
        tokio::select! {
            // Forward turn events to this client.
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let msg = WsMessage::from(event);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Live feed client lagged behind broadcast");
                        let sync = WsMessage::SessionsSync {
                            sessions: engine.session_summaries().await,
                        };
                        if let Ok(json) = serde_json::to_string(&sync) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }

            // The feed is one-way; clients only ping or close.
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Live feed client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Live feed connection closed");
}

// ── REST endpoints ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TurnRequest {
    /// Omitted on the first turn; the server mints a session id.
    session_id: Option<Uuid>,
    text: String,
    /// Explicit action trigger (e.g. from a form button), if any.
    #[serde(default)]
    action: Option<String>,
}

async fn process_turn(
    State(state): State<AppState>,
    Json(body): Json<TurnRequest>,
) -> impl IntoResponse {
    let session_id = body.session_id.unwrap_or_else(Uuid::new_v4);

    match state
        .engine
        .process_turn(session_id, &body.text, body.action.as_deref())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(EngineError::EmptyUtterance { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Utterance text must not be empty"})),
        ),
        Err(EngineError::SessionCancelled { .. }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "Session was cancelled during the turn"})),
        ),
    }
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.session_summaries().await)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_sessions(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    Json(state.engine.search_sessions(&query.q).await)
}

async fn get_history(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let session_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid session ID"})),
            );
        }
    };

    let entries = state.engine.get_history(session_id).await;
    (StatusCode::OK, Json(serde_json::json!(entries)))
}

async fn reset_session(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let session_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid session ID"})),
            );
        }
    };

    if state.engine.reset_session(session_id).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "reset"})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
    }
}

async fn archive_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let session_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid session ID"})),
            );
        }
    };

    if state.engine.archive_session(session_id).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "archived"})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
    }
}

async fn analytics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.analytics().await)
}
