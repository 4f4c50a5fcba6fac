const STATUS_FRAME: &str = "game.status";
const MESSAGE_FRAME: &str = "message.appended";
const NEWS_FRAME: &str = "news.appended";
const ACTION_FRAME: &str = "action.result";
const LAGGED_FRAME: &str = "stream.lagged";

const FILTERABLE_FRAMES: [&str; 4] = [STATUS_FRAME, MESSAGE_FRAME, NEWS_FRAME, ACTION_FRAME];

/// `types` is a comma separated subset of the filterable frame types. The `after_*` cursors
/// are log sequences the client already holds; entries past them are replayed on connect.
#[derive(Debug, Default, Deserialize)]
struct StreamQuery {
    types: Option<String>,
    after_message: Option<u64>,
    after_news: Option<u64>,
}

/// Per-connection view of the broadcast: which frames the client asked for and the last
/// log sequences it has been sent.
#[derive(Debug)]
struct StreamCursor {
    game_id: String,
    types: Option<Vec<&'static str>>,
    last_message: u64,
    last_news: u64,
    turn: u32,
}

impl StreamCursor {
    fn new(game_id: &str, query: &StreamQuery) -> Result<Self, HttpApiError> {
        let types = match query.types.as_deref() {
            None => None,
            Some(raw) => {
                let mut wanted = Vec::new();
                for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
                    let Some(known) = FILTERABLE_FRAMES.iter().find(|known| **known == name) else {
                        return Err(HttpApiError::invalid_query(
                            "unknown stream frame type",
                            Some(format!("type={name}")),
                        ));
                    };
                    wanted.push(*known);
                }
                Some(wanted)
            }
        };

        Ok(Self {
            game_id: game_id.to_string(),
            types,
            last_message: query.after_message.unwrap_or(0),
            last_news: query.after_news.unwrap_or(0),
            turn: 0,
        })
    }

    fn wants(&self, message_type: &str) -> bool {
        message_type == LAGGED_FRAME
            || self
                .types
                .as_ref()
                .map_or(true, |types| types.iter().any(|wanted| *wanted == message_type))
    }

    /// Whether a frame goes out on this connection. Log frames at or below the cursor were
    /// already sent, either during replay or live.
    fn admit(&mut self, frame: &StreamMessage) -> bool {
        if frame.game_id != self.game_id || !self.wants(&frame.message_type) {
            return false;
        }

        let last = match frame.message_type.as_str() {
            MESSAGE_FRAME => &mut self.last_message,
            NEWS_FRAME => &mut self.last_news,
            _ => {
                self.turn = self.turn.max(frame.turn);
                return true;
            }
        };
        if let Some(sequence) = frame.sequence {
            if sequence <= *last {
                return false;
            }
            *last = sequence;
        }
        self.turn = self.turn.max(frame.turn);
        true
    }

    /// Frames sent on connect: the current status, then log entries past the client's
    /// cursors. Without a cursor the client starts from the live tail of that log.
    fn backlog(&mut self, api: &EngineApi, query: &StreamQuery) -> Vec<StreamMessage> {
        let messages = api.messages();
        let news = api.news();
        if query.after_message.is_none() {
            self.last_message = messages
                .iter()
                .filter_map(|message| log_sequence(&message.id))
                .max()
                .unwrap_or(0);
        }
        if query.after_news.is_none() {
            self.last_news = news
                .iter()
                .filter_map(|item| log_sequence(&item.id))
                .max()
                .unwrap_or(0);
        }

        let mut candidates = vec![StreamMessage::game_status(&api.status())];
        candidates.extend(
            messages
                .iter()
                .map(|message| StreamMessage::message_appended(&self.game_id, message)),
        );
        candidates.extend(
            news.iter()
                .map(|item| StreamMessage::news_appended(&self.game_id, item)),
        );

        candidates
            .into_iter()
            .filter(|frame| self.admit(frame))
            .collect()
    }

    /// Sent in place of frames the connection fell behind on. Reconnecting with the carried
    /// cursors replays whatever log entries were dropped.
    fn lagged(&self, skipped: u64) -> StreamMessage {
        StreamMessage {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: LAGGED_FRAME.to_string(),
            game_id: self.game_id.clone(),
            turn: self.turn,
            sequence: None,
            reconnect_token: format!(
                "resume:{}:{}:{}",
                self.turn, self.last_message, self.last_news
            ),
            payload: json!({
                "skipped": skipped,
                "after_message": self.last_message,
                "after_news": self.last_news,
            }),
        }
    }
}

async fn stream_game(
    Path(game_id): Path<String>,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, HttpApiError> {
    let mut cursor = StreamCursor::new(&game_id, &query)?;

    // Subscribe before reading the logs so nothing lands between replay and live frames.
    let rx = state.stream_tx.subscribe();
    let backlog = {
        let inner = state.inner.read().await;
        cursor.backlog(require_game(&inner, &game_id)?, &query)
    };

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, rx, cursor, backlog)))
}

async fn stream_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<StreamMessage>,
    mut cursor: StreamCursor,
    backlog: Vec<StreamMessage>,
) {
    for frame in &backlog {
        if send_stream_message(&mut socket, frame).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                // Pings are answered by the websocket layer; clients have nothing else to say.
                if matches!(incoming, None | Some(Err(_)) | Some(Ok(Message::Close(_)))) {
                    break;
                }
            }
            outgoing = rx.recv() => {
                let frame = match outgoing {
                    Ok(frame) if cursor.admit(&frame) => frame,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(game_id = %cursor.game_id, skipped, "stream client lagged");
                        cursor.lagged(skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if send_stream_message(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn send_stream_message(
    socket: &mut WebSocket,
    message: &StreamMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

#[derive(Debug, Clone, Serialize)]
struct StreamMessage {
    schema_version: String,
    #[serde(rename = "type")]
    message_type: String,
    game_id: String,
    turn: u32,
    sequence: Option<u64>,
    reconnect_token: String,
    payload: Value,
}

impl StreamMessage {
    fn game_status(status: &GameStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: STATUS_FRAME.to_string(),
            game_id: status.game_id.clone(),
            turn: status.turn,
            sequence: None,
            reconnect_token: reconnect_token(status.turn, None, "status"),
            payload: json!(status),
        }
    }

    fn message_appended(game_id: &str, message: &ChatMessage) -> Self {
        let sequence = log_sequence(&message.id);
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: MESSAGE_FRAME.to_string(),
            game_id: game_id.to_string(),
            turn: message.turn,
            sequence,
            reconnect_token: reconnect_token(message.turn, sequence, "message"),
            payload: json!(message),
        }
    }

    fn news_appended(game_id: &str, item: &NewsItem) -> Self {
        let sequence = log_sequence(&item.id);
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: NEWS_FRAME.to_string(),
            game_id: game_id.to_string(),
            turn: item.turn,
            sequence,
            reconnect_token: reconnect_token(item.turn, sequence, "news"),
            payload: json!(item),
        }
    }

    fn action_result(turn: u32, entry: &ActionLogEntry) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: ACTION_FRAME.to_string(),
            game_id: entry.action.game_id.clone(),
            turn,
            sequence: None,
            reconnect_token: reconnect_token(turn, None, "action"),
            payload: json!({
                "action": entry.action,
                "result": entry.result,
            }),
        }
    }
}
