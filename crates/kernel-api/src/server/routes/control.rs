#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateGameRequest {
    Config(GameConfig),
    WithOptions(CreateGameOptions),
}

#[derive(Debug, Default, Deserialize)]
struct CreateGameOptions {
    config: Option<GameConfig>,
    game_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateGameResponse {
    schema_version: String,
    game_id: String,
    status: GameStatus,
    replaced_existing_game: bool,
    text_service_online: bool,
}

async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, HttpApiError> {
    let config = match request {
        CreateGameRequest::Config(config) => config,
        CreateGameRequest::WithOptions(options) => {
            let mut config = options.config.unwrap_or_default();
            if let Some(game_id) = options.game_id.filter(|id| !id.trim().is_empty()) {
                config.game_id = game_id;
            }
            config
        }
    };

    let _in_flight = state.begin_action(&config.game_id)?;
    let (response, messages) = {
        let mut inner = state.inner.write().await;
        let replaced_existing_game = inner.engine.is_some();

        let engine = EngineApi::with_collaborators(config, state.collaborators.clone())
            .map_err(HttpApiError::from_api_error)?;
        let status = engine.status();
        inner.install(engine);
        if replaced_existing_game {
            warn!(game_id = %status.game_id, "existing game replaced");
        }
        info!(game_id = %status.game_id, "game created");

        (
            CreateGameResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                game_id: status.game_id.clone(),
                status,
                replaced_existing_game,
                text_service_online: state.collaborators.is_online(),
            },
            collect_delta_messages(&mut inner),
        )
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

async fn submit_action(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Json(action): Json<PlayerAction>,
) -> Result<Json<ActionResult>, HttpApiError> {
    if action.game_id != game_id {
        return Err(HttpApiError::invalid_action(
            "action.game_id must match path game_id",
            Some(format!(
                "path_game_id={game_id} action_game_id={}",
                action.game_id
            )),
        ));
    }

    let result = dispatch_action(&state, game_id, ActionRequest::Client(action)).await?;
    Ok(Json(result))
}

async fn advance_game(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let result = dispatch_action(&state, game_id, ActionRequest::Route(ActionPayload::Advance)).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct SetCellRequest {
    cell_type: String,
}

async fn set_cell(
    Path((game_id, cell_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(request): Json<SetCellRequest>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let payload = ActionPayload::SetCellType {
        cell_id,
        cell_type: request.cell_type,
    };
    let result = dispatch_action(&state, game_id, ActionRequest::Route(payload)).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ProposalRequest {
    #[serde(default)]
    strategy_text: String,
}

async fn submit_proposal(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ProposalRequest>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let payload = ActionPayload::SubmitProposal {
        strategy_text: request.strategy_text,
    };
    let result = dispatch_action(&state, game_id, ActionRequest::Route(payload)).await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalRequest {
    strategy_text: Option<String>,
}

async fn request_approval(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let payload = ActionPayload::RequestApproval {
        strategy_text: request.strategy_text,
    };
    let result = dispatch_action(&state, game_id, ActionRequest::Route(payload)).await?;
    Ok(Json(result))
}

async fn revise_proposal(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let result = dispatch_action(&state, game_id, ActionRequest::Route(ActionPayload::Revise)).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    persona_id: String,
    text: String,
}

async fn chat(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let payload = ActionPayload::Chat {
        persona_id: request.persona_id,
        text: request.text,
    };
    let result = dispatch_action(&state, game_id, ActionRequest::Route(payload)).await?;
    Ok(Json(result))
}

async fn reset_game(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ActionResult>, HttpApiError> {
    let result = dispatch_action(&state, game_id, ActionRequest::Route(ActionPayload::Reset)).await?;
    Ok(Json(result))
}
