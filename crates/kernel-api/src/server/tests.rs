use std::sync::mpsc;

use kernel_core::{CollaboratorError, DialogueCollaborator, DialogueContext};

use super::*;

const GAME: &str = "game_local_001";

fn state_with(collaborators: Collaborators) -> AppState {
    let state = AppState::new(collaborators.clone());
    let engine = EngineApi::with_collaborators(GameConfig::default(), collaborators)
        .expect("default config");
    state
        .inner
        .try_write()
        .expect("fresh state is unlocked")
        .install(engine);
    state
}

fn state_with_game() -> AppState {
    state_with(Collaborators::offline())
}

fn drain(rx: &mut broadcast::Receiver<StreamMessage>) -> Vec<StreamMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn chat_payload() -> ActionPayload {
    ActionPayload::Chat {
        persona_id: "aunt_zhang".to_string(),
        text: "How bad is the noise?".to_string(),
    }
}

/// Signals when a reply is requested, then holds the caller until released.
struct HeldDialogue {
    started: std::sync::Mutex<mpsc::Sender<()>>,
    release: std::sync::Mutex<mpsc::Receiver<()>>,
}

impl DialogueCollaborator for HeldDialogue {
    fn generate_reply(
        &self,
        _context: &DialogueContext<'_>,
        _user_text: &str,
    ) -> Result<String, CollaboratorError> {
        if let Ok(started) = self.started.lock() {
            let _ = started.send(());
        }
        if let Ok(release) = self.release.lock() {
            let _ = release.recv();
        }
        Ok("The trucks start at five.".to_string())
    }
}

#[test]
fn pagination_enforces_max_bounds() {
    let (start, end, next_cursor) = paginate(100, Some(10), Some(20)).expect("page should work");
    assert_eq!(start, 10);
    assert_eq!(end, 30);
    assert_eq!(next_cursor, Some(30));

    let (_, end, next_cursor) = paginate(10_000, None, Some(50_000)).expect("clamped");
    assert_eq!(end, MAX_PAGE_SIZE);
    assert_eq!(next_cursor, Some(MAX_PAGE_SIZE));

    let out_of_range = paginate(5, Some(10), Some(1));
    assert!(out_of_range.is_err());
}

#[test]
fn log_ids_yield_stream_sequences() {
    assert_eq!(log_sequence("msg-000042"), Some(42));
    assert_eq!(log_sequence("news-000001"), Some(1));
    assert_eq!(log_sequence("welcome"), None);
    assert_eq!(reconnect_token(3, Some(7), "message"), "message:3:7");
    assert_eq!(reconnect_token(3, None, "status"), "status:3");
}

#[test]
fn api_errors_map_to_http_statuses() {
    let conflict =
        HttpApiError::from_api_error(ApiError::new(ErrorCode::PhaseConflict, "wrong phase", None));
    assert_eq!(conflict.status, StatusCode::CONFLICT);

    let violation = HttpApiError::from_api_error(ApiError::new(
        ErrorCode::ConstraintViolation,
        "over budget",
        None,
    ));
    assert_eq!(violation.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(HttpApiError::busy("g").status, StatusCode::CONFLICT);
    assert_eq!(
        HttpApiError::game_not_found("g", None).error.error_code,
        ErrorCode::GameNotFound
    );
}

#[test]
fn delta_messages_emit_each_entry_once() {
    let state = state_with_game();
    let mut inner = state.inner.try_write().expect("unlocked");

    let first = collect_delta_messages(&mut inner);
    assert!(first
        .iter()
        .any(|message| message.message_type == "message.appended"));
    assert_eq!(
        first.last().map(|message| message.message_type.as_str()),
        Some("game.status")
    );

    let second = collect_delta_messages(&mut inner);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].message_type, "game.status");
}

#[tokio::test]
async fn route_actions_run_and_stream_results() {
    let state = state_with_game();
    let mut rx = state.stream_tx.subscribe();

    let result = dispatch_action(
        &state,
        GAME.to_string(),
        ActionRequest::Route(ActionPayload::Advance),
    )
    .await
    .expect("dispatched");
    assert!(result.accepted);
    assert_eq!(result.action_id, "http-000001");
    assert_eq!(result.phase, contracts::Phase::Proposal);

    let types: Vec<String> = drain(&mut rx)
        .into_iter()
        .map(|message| message.message_type)
        .collect();
    assert!(types.contains(&"action.result".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("game.status"));
}

#[tokio::test]
async fn reset_streams_the_fresh_welcome() {
    let state = state_with_game();
    {
        let mut inner = state.inner.write().await;
        collect_delta_messages(&mut inner);
    }
    let mut rx = state.stream_tx.subscribe();

    let result = dispatch_action(&state, GAME.to_string(), ActionRequest::Route(ActionPayload::Reset))
        .await
        .expect("dispatched");
    assert!(result.accepted);

    let appended: Vec<Option<u64>> = drain(&mut rx)
        .into_iter()
        .filter(|frame| frame.message_type == "message.appended")
        .map(|frame| frame.sequence)
        .collect();
    assert_eq!(appended, vec![Some(2)]);
}

#[tokio::test]
async fn rejected_actions_still_return_a_result() {
    let state = state_with_game();
    let result = dispatch_action(
        &state,
        GAME.to_string(),
        ActionRequest::Route(ActionPayload::Revise),
    )
    .await
    .expect("dispatched");
    assert!(!result.accepted);
    assert_eq!(
        result.error.map(|error| error.error_code),
        Some(ErrorCode::PhaseConflict)
    );
}

#[tokio::test]
async fn unknown_game_is_not_found() {
    let state = state_with_game();
    let err = dispatch_action(
        &state,
        "other".to_string(),
        ActionRequest::Route(ActionPayload::Advance),
    )
    .await
    .expect_err("wrong game");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_action_is_refused_while_one_is_in_flight() {
    let state = state_with_game();
    let _held = state.action_gate.clone().lock_owned().await;

    let err = dispatch_action(
        &state,
        GAME.to_string(),
        ActionRequest::Route(ActionPayload::Advance),
    )
    .await
    .expect_err("action in flight");
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(err.error.error_code, ErrorCode::EngineBusy);

    let status = {
        let inner = state.inner.try_read().expect("reads stay open");
        require_game(&inner, GAME).expect("game").status()
    };
    assert_eq!(status.phase, contracts::Phase::Investigation);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_proceed_while_a_collaborator_reply_is_pending() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let mut collaborators = Collaborators::offline();
    collaborators.dialogue = Arc::new(HeldDialogue {
        started: std::sync::Mutex::new(started_tx),
        release: std::sync::Mutex::new(release_rx),
    });
    let state = state_with(collaborators);

    let chat_state = state.clone();
    let chat = tokio::spawn(async move {
        dispatch_action(&chat_state, GAME.to_string(), ActionRequest::Route(chat_payload())).await
    });
    tokio::task::spawn_blocking(move || started_rx.recv())
        .await
        .expect("join")
        .expect("reply requested");

    // Same read path the GET routes take; the chat has not committed yet.
    let messages_during_chat = {
        let inner = state.inner.try_read().expect("reads are not blocked by the chat");
        require_game(&inner, GAME).expect("game").messages().len()
    };
    assert_eq!(messages_during_chat, 1);

    let busy = dispatch_action(&state, GAME.to_string(), ActionRequest::Route(ActionPayload::Advance))
        .await
        .expect_err("chat still in flight");
    assert_eq!(busy.error.error_code, ErrorCode::EngineBusy);

    release_tx.send(()).expect("release reply");
    let result = chat.await.expect("join").expect("dispatched");
    assert!(result.accepted);

    let inner = state.inner.read().await;
    let api = require_game(&inner, GAME).expect("game");
    assert_eq!(api.messages().len(), 3);
    assert_eq!(
        api.messages()[2].content,
        "The trucks start at five."
    );
}

#[test]
fn stream_filter_rejects_unknown_frame_types() {
    let query = StreamQuery {
        types: Some("news.appended, snapshot.created".to_string()),
        ..StreamQuery::default()
    };
    let err = StreamCursor::new(GAME, &query).expect_err("unknown type");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[test]
fn stream_filter_passes_only_requested_frames() {
    let api = EngineApi::from_config(GameConfig::default()).expect("default config");
    let query = StreamQuery {
        types: Some("game.status".to_string()),
        ..StreamQuery::default()
    };
    let mut cursor = StreamCursor::new(GAME, &query).expect("valid filter");

    assert!(!cursor.admit(&StreamMessage::message_appended(GAME, &api.messages()[0])));
    assert!(cursor.admit(&StreamMessage::game_status(&api.status())));

    let mut other = api.status();
    other.game_id = "game_other".to_string();
    assert!(!cursor.admit(&StreamMessage::game_status(&other)));

    assert_eq!(cursor.lagged(4).message_type, "stream.lagged");
    assert!(cursor.wants("stream.lagged"));
}

#[test]
fn stream_replays_log_entries_after_the_cursor_once() {
    let mut api = EngineApi::from_config(GameConfig::default()).expect("default config");
    let chat = PlayerAction::new("a-1", GAME, chat_payload());
    assert!(api.submit_action(chat).accepted);

    let query = StreamQuery {
        after_message: Some(1),
        ..StreamQuery::default()
    };
    let mut cursor = StreamCursor::new(GAME, &query).expect("valid");
    let backlog = cursor.backlog(&api, &query);

    assert_eq!(backlog[0].message_type, "game.status");
    let replayed: Vec<Option<u64>> = backlog
        .iter()
        .filter(|frame| frame.message_type == "message.appended")
        .map(|frame| frame.sequence)
        .collect();
    assert_eq!(replayed, vec![Some(2), Some(3)]);

    // The same entry arriving live after replay is not sent twice.
    assert!(!cursor.admit(&StreamMessage::message_appended(GAME, &api.messages()[2])));

    let lagged = cursor.lagged(10);
    assert_eq!(lagged.payload["after_message"], json!(3));
    assert_eq!(lagged.payload["skipped"], json!(10));
}

#[test]
fn stream_without_cursor_starts_at_the_live_tail() {
    let api = EngineApi::from_config(GameConfig::default()).expect("default config");
    let query = StreamQuery::default();
    let mut cursor = StreamCursor::new(GAME, &query).expect("valid");

    let backlog = cursor.backlog(&api, &query);
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].message_type, "game.status");
    assert!(!cursor.admit(&StreamMessage::message_appended(GAME, &api.messages()[0])));
}
