//! In-process API facade: action validation, dispatch to the turn engine, audit log, and the
//! wiring of text collaborators.

pub mod collaborators;
pub mod llm;
mod server;

use std::fmt;
use std::sync::Arc;

use contracts::{
    ActionPayload, ActionResult, ApiError, CellType, ChatMessage, ErrorCode, GameConfig,
    GameStatus, NewsItem, PersonaId, PlayerAction, SCHEMA_VERSION_V1,
};
use kernel_core::{
    ApprovalAdvisor, DialogueCollaborator, EngineError, NarrativeCollaborator,
    OfflineCollaborator, ProposalPreview, TurnEngine,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub use collaborators::LlmCollaborators;
pub use llm::{LlmConfigError, LlmSettings, OpenAiChatCompletionClient};
pub use server::{serve, ServerError};

/// The three text collaborators an engine talks to. Shared across threads by the server.
#[derive(Clone)]
pub struct Collaborators {
    pub dialogue: Arc<dyn DialogueCollaborator + Send + Sync>,
    pub advisor: Arc<dyn ApprovalAdvisor + Send + Sync>,
    pub narrator: Arc<dyn NarrativeCollaborator + Send + Sync>,
    online: bool,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("online", &self.online)
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    pub fn offline() -> Self {
        Self::shared(OfflineCollaborator, false)
    }

    /// One value serving all three roles.
    pub fn shared<C>(collaborator: C, online: bool) -> Self
    where
        C: DialogueCollaborator + ApprovalAdvisor + NarrativeCollaborator + Send + Sync + 'static,
    {
        let shared = Arc::new(collaborator);
        Self {
            dialogue: shared.clone(),
            advisor: shared.clone(),
            narrator: shared,
            online,
        }
    }

    /// Builds the text-service collaborators from the environment, or offline ones when no
    /// key is configured. Blocking: call outside async runtime threads.
    pub fn from_env() -> Self {
        match LlmSettings::from_env() {
            Ok(settings) => Self::from_settings(&settings),
            Err(LlmConfigError::MissingEnv { key }) => {
                info!(env = key, "text service not configured; collaborators run offline");
                Self::offline()
            }
            Err(err) => {
                warn!(error = %err, "text service config rejected; collaborators run offline");
                Self::offline()
            }
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        match OpenAiChatCompletionClient::from_settings(settings) {
            Ok(client) => {
                info!(model = %settings.model, base_url = %settings.base_url, "text service enabled");
                Self::shared(LlmCollaborators::new(client), true)
            }
            Err(err) => {
                warn!(error = %err, "text service client failed to build; collaborators run offline");
                Self::offline()
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionLogEntry {
    pub action: PlayerAction,
    pub result: ActionResult,
}

#[derive(Debug, Clone)]
pub struct EngineApi {
    engine: TurnEngine,
    collaborators: Collaborators,
    action_log: Vec<ActionLogEntry>,
}

impl EngineApi {
    pub fn from_config(config: GameConfig) -> Result<Self, ApiError> {
        Self::with_collaborators(config, Collaborators::offline())
    }

    pub fn with_collaborators(
        config: GameConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ApiError> {
        if config.schema_version != SCHEMA_VERSION_V1 {
            return Err(unsupported_version(&config.schema_version));
        }
        let engine = TurnEngine::new(config).map_err(|err| engine_error_to_api(&err))?;
        Ok(Self {
            engine,
            collaborators,
            action_log: Vec::new(),
        })
    }

    pub fn game_id(&self) -> &str {
        &self.engine.config().game_id
    }

    pub fn config(&self) -> &GameConfig {
        self.engine.config()
    }

    pub fn engine(&self) -> &TurnEngine {
        &self.engine
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn status(&self) -> GameStatus {
        self.engine.status()
    }

    pub fn preview(&self) -> Result<ProposalPreview, ApiError> {
        self.engine.preview().map_err(|err| engine_error_to_api(&err))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.engine.messages()
    }

    pub fn news(&self) -> &[NewsItem] {
        self.engine.news()
    }

    pub fn action_log(&self) -> &[ActionLogEntry] {
        &self.action_log
    }

    pub fn submit_action(&mut self, action: PlayerAction) -> ActionResult {
        let result = match self.validate_action(&action) {
            Some(error) => ActionResult::rejected(&action, self.engine.phase(), error),
            None => match self.dispatch(&action.payload) {
                Ok(outcome) => ActionResult::accepted(&action, self.engine.phase(), Some(outcome)),
                Err(err) => {
                    ActionResult::rejected(&action, self.engine.phase(), engine_error_to_api(&err))
                }
            },
        };

        if !result.accepted {
            info!(
                action_id = %action.action_id,
                action_type = action.payload.action_type(),
                error = ?result.error.as_ref().map(|error| error.error_code),
                "action rejected"
            );
        }
        self.action_log.push(ActionLogEntry {
            action,
            result: result.clone(),
        });
        result
    }

    fn validate_action(&self, action: &PlayerAction) -> Option<ApiError> {
        if action.schema_version != SCHEMA_VERSION_V1 {
            return Some(unsupported_version(&action.schema_version));
        }

        if action.game_id != self.game_id() {
            return Some(ApiError::new(
                ErrorCode::GameNotFound,
                "action.game_id does not match the active game",
                Some(format!(
                    "requested_game_id={} active_game_id={}",
                    action.game_id,
                    self.game_id()
                )),
            ));
        }

        if action.action_id.trim().is_empty() {
            return Some(ApiError::new(
                ErrorCode::InvalidAction,
                "action_id must not be empty",
                None,
            ));
        }

        match &action.payload {
            ActionPayload::SetCellType { cell_type, .. } if cell_type.parse::<CellType>().is_err() => {
                Some(ApiError::new(
                    ErrorCode::InvalidCellType,
                    "cell_type is not a known land use",
                    Some(format!("cell_type={cell_type}")),
                ))
            }
            ActionPayload::Chat { persona_id, .. } if persona_id.parse::<PersonaId>().is_err() => {
                Some(ApiError::new(
                    ErrorCode::UnknownPersona,
                    "persona_id is not a known stakeholder",
                    Some(format!("persona_id={persona_id}")),
                ))
            }
            ActionPayload::Chat { text, .. } if text.trim().is_empty() => Some(ApiError::new(
                ErrorCode::InvalidAction,
                "chat text must not be empty",
                None,
            )),
            _ => None,
        }
    }

    fn dispatch(&mut self, payload: &ActionPayload) -> Result<Value, EngineError> {
        match payload {
            ActionPayload::Advance => {
                let phase = self.engine.advance()?;
                Ok(json!({ "phase": phase, "turn": self.engine.turn() }))
            }
            ActionPayload::SetCellType { cell_id, cell_type } => {
                let cell = self.engine.set_cell_type(cell_id, cell_type)?;
                Ok(json!({ "cell": cell }))
            }
            ActionPayload::SubmitProposal { strategy_text } => {
                let report = self.engine.submit_proposal(strategy_text)?;
                Ok(json!({ "constraints": report }))
            }
            ActionPayload::RequestApproval { strategy_text } => {
                let advisor = Arc::clone(&self.collaborators.advisor);
                let verdict = self
                    .engine
                    .request_approval(strategy_text.as_deref(), advisor.as_ref())?;
                if !verdict.approved {
                    return Ok(json!({ "verdict": verdict, "turn_report": Value::Null }));
                }
                let narrator = Arc::clone(&self.collaborators.narrator);
                let report = self.engine.run_simulation(narrator.as_ref())?;
                Ok(json!({ "verdict": verdict, "turn_report": report }))
            }
            ActionPayload::Revise => {
                let phase = self.engine.revise()?;
                Ok(json!({ "phase": phase }))
            }
            ActionPayload::Chat { persona_id, text } => {
                let persona: PersonaId = persona_id
                    .parse()
                    .map_err(|_| EngineError::UnknownPersona(persona_id.clone()))?;
                let dialogue = Arc::clone(&self.collaborators.dialogue);
                let exchange = self.engine.chat(persona, text, dialogue.as_ref())?;
                Ok(json!(exchange))
            }
            ActionPayload::Reset => {
                self.engine.reset();
                Ok(json!({ "status": self.engine.status() }))
            }
        }
    }
}

fn unsupported_version(got: &str) -> ApiError {
    ApiError::new(
        ErrorCode::ContractVersionUnsupported,
        "Unsupported schema_version",
        Some(format!("got={got} expected={SCHEMA_VERSION_V1}")),
    )
}

pub fn engine_error_to_api(err: &EngineError) -> ApiError {
    let message = err.to_string();
    match err {
        EngineError::InvalidConfig(_)
        | EngineError::PersonaNotChattable(_)
        | EngineError::EmptyMessage => ApiError::new(ErrorCode::InvalidAction, message, None),
        EngineError::InvalidCellId(cell_id) => ApiError::new(
            ErrorCode::InvalidCellId,
            message,
            Some(format!("cell_id={cell_id}")),
        ),
        EngineError::InvalidCellType(raw) => ApiError::new(
            ErrorCode::InvalidCellType,
            message,
            Some(format!("cell_type={raw}")),
        ),
        EngineError::PhaseConflict { phase, operation } => ApiError::new(
            ErrorCode::PhaseConflict,
            message,
            Some(format!("phase={phase} operation={operation}")),
        ),
        EngineError::ConstraintViolations(violations) => {
            ApiError::new(ErrorCode::ConstraintViolation, message, None)
                .with_violations(violations.clone())
        }
        EngineError::UnknownPersona(raw) => ApiError::new(
            ErrorCode::UnknownPersona,
            message,
            Some(format!("persona_id={raw}")),
        ),
        EngineError::ShapeMismatch(_) => ApiError::new(ErrorCode::InternalError, message, None),
    }
}
