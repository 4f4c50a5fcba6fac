use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

mod logs;
mod transitions;

use contracts::{
    ChatMessage, ConstraintViolation, GameConfig, GameStatus, Metrics, NewsItem, Phase,
    PersonaId, StateSummary, SCHEMA_VERSION_V1,
};
use serde::Serialize;
use tracing::info;

use crate::approval::{ApprovalVerdict, HardConstraintReport};
use crate::collab::{ApprovalAdvisor, DialogueCollaborator, NarrativeCollaborator};
use crate::diff::{compute_diff, CostPolicy, DiffOutcome};
use crate::grid::{create_grid, Grid, GridError};
use crate::narrative::NarrativeDraft;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidConfig(String),
    InvalidCellId(String),
    InvalidCellType(String),
    PhaseConflict {
        phase: Phase,
        operation: &'static str,
    },
    ConstraintViolations(Vec<ConstraintViolation>),
    UnknownPersona(String),
    PersonaNotChattable(PersonaId),
    EmptyMessage,
    ShapeMismatch(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid game config: {reason}"),
            Self::InvalidCellId(cell_id) => write!(f, "unknown cell id: {cell_id}"),
            Self::InvalidCellType(raw) => write!(f, "unknown cell type: {raw}"),
            Self::PhaseConflict { phase, operation } => {
                write!(f, "{operation} is not allowed in phase {phase}")
            }
            Self::ConstraintViolations(violations) => {
                write!(f, "hard constraints violated: ")?;
                for (index, violation) in violations.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
            Self::UnknownPersona(raw) => write!(f, "unknown persona: {raw}"),
            Self::PersonaNotChattable(persona) => write!(f, "persona {persona} does not chat"),
            Self::EmptyMessage => write!(f, "message text must not be empty"),
            Self::ShapeMismatch(reason) => write!(f, "grid shape mismatch: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<GridError> for EngineError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InvalidCellId(cell_id) => Self::InvalidCellId(cell_id),
            other => Self::ShapeMismatch(other.to_string()),
        }
    }
}

/// Live cost/impact view of the working grid against the committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalPreview {
    pub phase: Phase,
    pub diff: DiffOutcome,
    pub budget: i64,
    pub budget_after: i64,
    pub constraints: HardConstraintReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    pub turn: u32,
    pub strategy_text: String,
    pub diff: DiffOutcome,
    pub metrics_before: Metrics,
    pub metrics_after: Metrics,
    pub budget_before: i64,
    pub budget_after: i64,
    pub narrative: NarrativeDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
    pub degraded: bool,
}

/// Owns every piece of mutable game state; all changes go through the transition methods.
#[derive(Debug, Clone)]
pub struct TurnEngine {
    config: GameConfig,
    policy: CostPolicy,
    turn: u32,
    phase: Phase,
    budget: i64,
    metrics: Metrics,
    grid: Grid,
    snapshot: Grid,
    strategy_text: String,
    messages: Vec<ChatMessage>,
    news: Vec<NewsItem>,
    message_sequence: u64,
    news_sequence: u64,
    last_timestamp_ms: u64,
    last_report: Option<TurnReport>,
}

impl TurnEngine {
    pub fn new(config: GameConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let grid = create_grid(config.grid_size);
        let mut engine = Self {
            policy: CostPolicy::from_config(&config),
            turn: 1,
            phase: Phase::Investigation,
            budget: config.initial_budget,
            metrics: config.initial_metrics,
            snapshot: grid.clone(),
            grid,
            strategy_text: String::new(),
            messages: Vec::new(),
            news: Vec::new(),
            message_sequence: 0,
            news_sequence: 0,
            last_timestamp_ms: 0,
            last_report: None,
            config,
        };
        engine.log_welcome();
        info!(
            game_id = %engine.config.game_id,
            grid_size = engine.config.grid_size,
            max_turns = engine.config.max_turns,
            "game created"
        );
        Ok(engine)
    }

    /// Back to the opening state of the same configuration. The logs are cleared but their
    /// id sequences keep counting, so an id is never handed out twice in one game.
    pub fn reset(&mut self) {
        let grid = create_grid(self.config.grid_size);
        self.turn = 1;
        self.phase = Phase::Investigation;
        self.budget = self.config.initial_budget;
        self.metrics = self.config.initial_metrics;
        self.snapshot = grid.clone();
        self.grid = grid;
        self.strategy_text.clear();
        self.messages.clear();
        self.news.clear();
        self.last_report = None;
        self.log_welcome();
        info!(game_id = %self.config.game_id, "game reset");
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn snapshot(&self) -> &Grid {
        &self.snapshot
    }

    pub fn strategy_text(&self) -> &str {
        &self.strategy_text
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn news(&self) -> &[NewsItem] {
        &self.news
    }

    pub fn last_report(&self) -> Option<&TurnReport> {
        self.last_report.as_ref()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            game_id: self.config.game_id.clone(),
            turn: self.turn,
            max_turns: self.config.max_turns,
            phase: self.phase,
            budget: self.budget,
            metrics: self.metrics,
            is_complete: self.phase.is_terminal(),
        }
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            turn: self.turn,
            max_turns: self.config.max_turns,
            phase: self.phase,
            budget: self.budget,
            metrics: self.metrics,
        }
    }

    /// Available in every phase; never mutates state.
    pub fn preview(&self) -> Result<ProposalPreview, EngineError> {
        let diff = compute_diff(&self.snapshot, &self.grid, &self.strategy_text, &self.policy)?;
        let constraints = crate::approval::check_hard_constraints(
            &self.grid,
            &self.snapshot,
            self.budget,
            &self.policy,
        )?;
        Ok(ProposalPreview {
            phase: self.phase,
            budget: self.budget,
            budget_after: self.budget.saturating_add(diff.budget_delta),
            diff,
            constraints,
        })
    }

    fn require_phase(&self, expected: Phase, operation: &'static str) -> Result<(), EngineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::PhaseConflict {
                phase: self.phase,
                operation,
            })
        }
    }

    fn transition(&mut self, next: Phase) {
        assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        info!(
            game_id = %self.config.game_id,
            turn = self.turn,
            from = %self.phase,
            to = %next,
            "phase transition"
        );
        self.phase = next;
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
