#[derive(Clone)]
struct AppState {
    inner: Arc<RwLock<ServerInner>>,
    /// Held for the whole life of a mutating request, collaborator call included. Readers never
    /// touch it; `inner` is only write-locked briefly to take a working copy and to commit it.
    action_gate: Arc<Mutex<()>>,
    stream_tx: broadcast::Sender<StreamMessage>,
    collaborators: Collaborators,
}

impl AppState {
    fn new(collaborators: Collaborators) -> Self {
        let (stream_tx, _) = broadcast::channel(4096);
        Self {
            inner: Arc::new(RwLock::new(ServerInner::default())),
            action_gate: Arc::new(Mutex::new(())),
            stream_tx,
            collaborators,
        }
    }

    /// A second mutating request is refused rather than queued.
    fn begin_action(&self, game_id: &str) -> Result<OwnedMutexGuard<()>, HttpApiError> {
        self.action_gate
            .clone()
            .try_lock_owned()
            .map_err(|_| HttpApiError::busy(game_id))
    }
}

#[derive(Debug, Default)]
struct ServerInner {
    engine: Option<EngineApi>,
    /// Highest log sequence already streamed. Engine ids keep counting across a reset, so
    /// these only go back to zero when a new game is installed.
    emitted_message_seq: u64,
    emitted_news_seq: u64,
    emitted_action_count: usize,
    next_action_seq: u64,
}

impl ServerInner {
    fn install(&mut self, engine: EngineApi) {
        self.engine = Some(engine);
        self.emitted_message_seq = 0;
        self.emitted_news_seq = 0;
        self.emitted_action_count = 0;
    }

    fn next_action_id(&mut self) -> String {
        self.next_action_seq += 1;
        format!("http-{:06}", self.next_action_seq)
    }
}

fn require_game<'a>(inner: &'a ServerInner, game_id: &str) -> Result<&'a EngineApi, HttpApiError> {
    let Some(engine) = inner.engine.as_ref() else {
        return Err(HttpApiError::game_not_found(game_id, None));
    };

    if engine.game_id() != game_id {
        return Err(HttpApiError::game_not_found(game_id, Some(engine.game_id())));
    }

    Ok(engine)
}

/// Frames for every log entry and action not streamed yet, followed by the current status.
fn collect_delta_messages(inner: &mut ServerInner) -> Vec<StreamMessage> {
    let mut messages = Vec::new();

    let Some(engine) = inner.engine.as_ref() else {
        return messages;
    };
    let status = engine.status();

    for message in engine.messages() {
        let Some(sequence) = log_sequence(&message.id) else {
            continue;
        };
        if sequence > inner.emitted_message_seq {
            messages.push(StreamMessage::message_appended(&status.game_id, message));
            inner.emitted_message_seq = sequence;
        }
    }

    for item in engine.news() {
        let Some(sequence) = log_sequence(&item.id) else {
            continue;
        };
        if sequence > inner.emitted_news_seq {
            messages.push(StreamMessage::news_appended(&status.game_id, item));
            inner.emitted_news_seq = sequence;
        }
    }

    let actions = engine.action_log();
    for entry in &actions[inner.emitted_action_count.min(actions.len())..] {
        messages.push(StreamMessage::action_result(status.turn, entry));
    }
    inner.emitted_action_count = actions.len();

    messages.push(StreamMessage::game_status(&status));
    messages
}

fn broadcast_messages(state: &AppState, messages: Vec<StreamMessage>) {
    for message in messages {
        let _ = state.stream_tx.send(message);
    }
}

enum ActionRequest {
    Client(PlayerAction),
    Route(ActionPayload),
}

/// Runs one action on a working copy of the game on the blocking pool (collaborator calls
/// block on the text service), then commits the copy. Reads keep seeing the last committed
/// state meanwhile.
async fn dispatch_action(
    state: &AppState,
    game_id: String,
    request: ActionRequest,
) -> Result<ActionResult, HttpApiError> {
    let _in_flight = state.begin_action(&game_id)?;

    let (working, action) = {
        let mut inner = state.inner.write().await;
        let working = require_game(&inner, &game_id)?.clone();
        let action = match request {
            ActionRequest::Client(action) => action,
            ActionRequest::Route(payload) => {
                PlayerAction::new(inner.next_action_id(), game_id.clone(), payload)
            }
        };
        (working, action)
    };

    let (working, result) = tokio::task::spawn_blocking(move || {
        let mut working = working;
        let result = working.submit_action(action);
        (working, result)
    })
    .await
    .map_err(|err| HttpApiError::internal("action task failed", Some(err.to_string())))?;

    let messages = {
        let mut inner = state.inner.write().await;
        inner.engine = Some(working);
        collect_delta_messages(&mut inner)
    };

    broadcast_messages(state, messages);
    Ok(result)
}
