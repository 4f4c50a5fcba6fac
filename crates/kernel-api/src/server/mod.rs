use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ActionPayload, ActionResult, ApiError, ChatMessage, ErrorCode, GameConfig, GameStatus,
    NewsItem, PlayerAction, QueryResponse, SCHEMA_VERSION_V1,
};
use kernel_core::personas::{all_evidence, all_personas};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use crate::{ActionLogEntry, Collaborators, EngineApi};

const DEFAULT_PAGE_SIZE: usize = 500;
const MAX_PAGE_SIZE: usize = 5000;

include!("error.rs");
include!("state.rs");
include!("routes/control.rs");
include!("routes/query.rs");
include!("routes/stream.rs");
include!("util.rs");

/// Serves the game API until the listener fails. `collaborators` must already be built; the
/// blocking text-service client cannot be constructed on a runtime thread.
pub async fn serve(addr: SocketAddr, collaborators: Collaborators) -> Result<(), ServerError> {
    let state = AppState::new(collaborators);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "citypulse api listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/games", post(create_game))
        .route("/api/v1/personas", get(get_personas))
        .route("/api/v1/evidence", get(get_evidence))
        .route("/api/v1/games/{game_id}/status", get(get_status))
        .route("/api/v1/games/{game_id}/grid", get(get_grid))
        .route("/api/v1/games/{game_id}/preview", get(get_preview))
        .route("/api/v1/games/{game_id}/messages", get(get_messages))
        .route("/api/v1/games/{game_id}/news", get(get_news))
        .route(
            "/api/v1/games/{game_id}/actions",
            post(submit_action).get(get_actions),
        )
        .route("/api/v1/games/{game_id}/advance", post(advance_game))
        .route("/api/v1/games/{game_id}/cells/{cell_id}", post(set_cell))
        .route("/api/v1/games/{game_id}/proposal", post(submit_proposal))
        .route("/api/v1/games/{game_id}/approval", post(request_approval))
        .route("/api/v1/games/{game_id}/revise", post(revise_proposal))
        .route("/api/v1/games/{game_id}/chat", post(chat))
        .route("/api/v1/games/{game_id}/reset", post(reset_game))
        .route("/api/v1/games/{game_id}/stream", get(stream_game))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
