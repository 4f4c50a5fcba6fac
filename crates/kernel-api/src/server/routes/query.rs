#[derive(Debug, Deserialize, Default)]
struct PaginationQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LogPage<T> {
    schema_version: String,
    game_id: String,
    cursor: usize,
    next_cursor: Option<usize>,
    total: usize,
    entries: Vec<T>,
}

fn log_page<T: Clone>(
    game_id: &str,
    entries: &[T],
    query: &PaginationQuery,
) -> Result<LogPage<T>, HttpApiError> {
    let (start, end, next_cursor) = paginate(entries.len(), query.cursor, query.page_size)?;
    Ok(LogPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: game_id.to_string(),
        cursor: start,
        next_cursor,
        total: entries.len(),
        entries: entries[start..end].to_vec(),
    })
}

async fn get_status(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GameStatus>, HttpApiError> {
    let status = {
        let inner = state.inner.read().await;
        require_game(&inner, &game_id)?.status()
    };

    Ok(Json(status))
}

async fn get_grid(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.read().await;
        let engine = require_game(&inner, &game_id)?.engine();

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "grid.current".to_string(),
            game_id: game_id.clone(),
            generated_at_turn: engine.turn(),
            data: json!({
                "size": engine.grid().size(),
                "phase": engine.phase(),
                "cells": engine.grid().cells(),
                "snapshot_cells": engine.snapshot().cells(),
            }),
        }
    };

    Ok(Json(response))
}

async fn get_preview(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.read().await;
        let api = require_game(&inner, &game_id)?;
        let preview = api.preview().map_err(HttpApiError::from_api_error)?;

        QueryResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            query_type: "proposal.preview".to_string(),
            game_id: game_id.clone(),
            generated_at_turn: api.engine().turn(),
            data: json!(preview),
        }
    };

    Ok(Json(response))
}

async fn get_messages(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<LogPage<ChatMessage>>, HttpApiError> {
    let page = {
        let inner = state.inner.read().await;
        let api = require_game(&inner, &game_id)?;
        log_page(&game_id, api.messages(), &query)?
    };

    Ok(Json(page))
}

async fn get_news(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<LogPage<NewsItem>>, HttpApiError> {
    let page = {
        let inner = state.inner.read().await;
        let api = require_game(&inner, &game_id)?;
        log_page(&game_id, api.news(), &query)?
    };

    Ok(Json(page))
}

async fn get_actions(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<LogPage<ActionLogEntry>>, HttpApiError> {
    let page = {
        let inner = state.inner.read().await;
        let api = require_game(&inner, &game_id)?;
        log_page(&game_id, api.action_log(), &query)?
    };

    Ok(Json(page))
}

async fn get_personas() -> Json<Value> {
    Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "personas": all_personas(),
    }))
}

async fn get_evidence() -> Json<Value> {
    Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "evidence": all_evidence(),
    }))
}
