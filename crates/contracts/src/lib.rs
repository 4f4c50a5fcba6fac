//! v1 cross-boundary contracts for the turn engine, API facade, and HTTP surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION_V1: &str = "1.0";

pub const METRIC_MIN: i32 = 0;
pub const METRIC_MAX: i32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Residential,
    Factory,
    Park,
    Commercial,
    Empty,
}

impl CellType {
    pub const ALL: [CellType; 5] = [
        CellType::Residential,
        CellType::Factory,
        CellType::Park,
        CellType::Commercial,
        CellType::Empty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Factory => "factory",
            Self::Park => "park",
            Self::Commercial => "commercial",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCellType(pub String);

impl fmt::Display for UnknownCellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cell type: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCellType {}

impl FromStr for CellType {
    type Err = UnknownCellType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(Self::Residential),
            "factory" => Ok(Self::Factory),
            "park" => Ok(Self::Park),
            "commercial" => Ok(Self::Commercial),
            "empty" => Ok(Self::Empty),
            _ => Err(UnknownCellType(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub id: String,
    pub x: u32,
    pub y: u32,
    #[serde(rename = "type")]
    pub cell_type: CellType,
}

impl Cell {
    pub fn position_id(x: u32, y: u32) -> String {
        format!("{x}-{y}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Satisfaction,
    Economy,
    Environment,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Satisfaction,
        MetricKind::Economy,
        MetricKind::Environment,
    ];
}

/// Absolute city metrics. Every field stays in `[METRIC_MIN, METRIC_MAX]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metrics {
    pub satisfaction: i32,
    pub economy: i32,
    pub environment: i32,
}

impl Metrics {
    pub fn get(&self, kind: MetricKind) -> i32 {
        match kind {
            MetricKind::Satisfaction => self.satisfaction,
            MetricKind::Economy => self.economy,
            MetricKind::Environment => self.environment,
        }
    }

    /// Adds `delta` and clamps each field back into range.
    pub fn apply(&mut self, delta: &MetricDelta) {
        self.satisfaction = clamp_metric(self.satisfaction.saturating_add(delta.satisfaction));
        self.economy = clamp_metric(self.economy.saturating_add(delta.economy));
        self.environment = clamp_metric(self.environment.saturating_add(delta.environment));
    }

    pub fn is_within_bounds(&self) -> bool {
        MetricKind::ALL
            .iter()
            .all(|kind| (METRIC_MIN..=METRIC_MAX).contains(&self.get(*kind)))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            satisfaction: 40,
            economy: 30,
            environment: 30,
        }
    }
}

fn clamp_metric(value: i32) -> i32 {
    value.clamp(METRIC_MIN, METRIC_MAX)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricDelta {
    pub satisfaction: i32,
    pub economy: i32,
    pub environment: i32,
}

impl MetricDelta {
    pub fn get(&self, kind: MetricKind) -> i32 {
        match kind {
            MetricKind::Satisfaction => self.satisfaction,
            MetricKind::Economy => self.economy,
            MetricKind::Environment => self.environment,
        }
    }

    pub fn add(&mut self, kind: MetricKind, amount: i32) {
        let slot = match kind {
            MetricKind::Satisfaction => &mut self.satisfaction,
            MetricKind::Economy => &mut self.economy,
            MetricKind::Environment => &mut self.environment,
        };
        *slot = slot.saturating_add(amount);
    }

    pub fn merged(mut self, other: &MetricDelta) -> Self {
        for kind in MetricKind::ALL {
            self.add(kind, other.get(kind));
        }
        self
    }

    /// Symmetric clamp to `[-bound, bound]` per field.
    pub fn clamped(self, bound: i32) -> Self {
        let bound = bound.abs();
        Self {
            satisfaction: self.satisfaction.clamp(-bound, bound),
            economy: self.economy.clamp(-bound, bound),
            environment: self.environment.clamp(-bound, bound),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.satisfaction == 0 && self.economy == 0 && self.environment == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Investigation,
    Proposal,
    Approval,
    Simulation,
    Iteration,
    Ended,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Investigation,
        Phase::Proposal,
        Phase::Approval,
        Phase::Simulation,
        Phase::Iteration,
        Phase::Ended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Investigation => "investigation",
            Self::Proposal => "proposal",
            Self::Approval => "approval",
            Self::Simulation => "simulation",
            Self::Iteration => "iteration",
            Self::Ended => "ended",
        }
    }

    /// The complete transition graph. Guards (hard constraints, approval, turn limit)
    /// are enforced by the engine on top of this table.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Investigation, Phase::Proposal)
                | (Phase::Proposal, Phase::Approval)
                | (Phase::Approval, Phase::Simulation)
                | (Phase::Approval, Phase::Proposal)
                | (Phase::Simulation, Phase::Iteration)
                | (Phase::Iteration, Phase::Investigation)
                | (Phase::Iteration, Phase::Ended)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Ended
    }

    pub fn allows_dialogue(self) -> bool {
        matches!(
            self,
            Phase::Investigation | Phase::Approval | Phase::Iteration
        )
    }

    pub fn allows_grid_edit(self) -> bool {
        self == Phase::Proposal
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    pub schema_version: String,
    pub game_id: String,
    pub grid_size: u32,
    pub max_turns: u32,
    pub initial_budget: i64,
    pub initial_metrics: Metrics,
    pub operating_cost: i64,
    pub demolition_cost: i64,
    pub min_strategy_chars: usize,
    pub notes: Option<String>,
}

impl GameConfig {
    pub const MIN_GRID_SIZE: u32 = 3;
    pub const MAX_GRID_SIZE: u32 = 16;
    /// Upper bound for the starting budget and for each per-cell cost, so a whole game's
    /// budget arithmetic stays far inside `i64`.
    pub const MAX_BUDGET: i64 = 1_000_000_000_000;

    pub fn validate(&self) -> Result<(), String> {
        if !(Self::MIN_GRID_SIZE..=Self::MAX_GRID_SIZE).contains(&self.grid_size) {
            return Err(format!(
                "grid_size must be in [{}, {}], got {}",
                Self::MIN_GRID_SIZE,
                Self::MAX_GRID_SIZE,
                self.grid_size
            ));
        }
        if self.max_turns == 0 {
            return Err("max_turns must be >= 1".to_string());
        }
        if !(0..=Self::MAX_BUDGET).contains(&self.initial_budget) {
            return Err(format!(
                "initial_budget must be in [0, {}], got {}",
                Self::MAX_BUDGET,
                self.initial_budget
            ));
        }
        for (label, cost) in [
            ("operating_cost", self.operating_cost),
            ("demolition_cost", self.demolition_cost),
        ] {
            if !(0..=Self::MAX_BUDGET).contains(&cost) {
                return Err(format!(
                    "{label} must be in [0, {}], got {cost}",
                    Self::MAX_BUDGET
                ));
            }
        }
        if !self.initial_metrics.is_within_bounds() {
            return Err(format!(
                "initial_metrics must be within [{METRIC_MIN}, {METRIC_MAX}]"
            ));
        }
        if self.game_id.trim().is_empty() {
            return Err("game_id must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            game_id: "game_local_001".to_string(),
            grid_size: 5,
            max_turns: 5,
            initial_budget: 1000,
            initial_metrics: Metrics::default(),
            operating_cost: 10,
            demolition_cost: 5,
            min_strategy_chars: 5,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStatus {
    pub schema_version: String,
    pub game_id: String,
    pub turn: u32,
    pub max_turns: u32,
    pub phase: Phase,
    pub budget: i64,
    pub metrics: Metrics,
    pub is_complete: bool,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "game_id={} turn={}/{} phase={} budget={} satisfaction={} economy={} environment={}",
            self.game_id,
            self.turn,
            self.max_turns,
            self.phase,
            self.budget,
            self.metrics.satisfaction,
            self.metrics.economy,
            self.metrics.environment
        )
    }
}

/// Read-only view of engine state handed to the text collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateSummary {
    pub turn: u32,
    pub max_turns: u32,
    pub phase: Phase,
    pub budget: i64,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Unrecognised labels degrade to `Neutral`.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    AuntZhang,
    CeoLi,
    DrChen,
    GovOfficer,
    Narrator,
}

impl PersonaId {
    pub const ALL: [PersonaId; 5] = [
        PersonaId::AuntZhang,
        PersonaId::CeoLi,
        PersonaId::DrChen,
        PersonaId::GovOfficer,
        PersonaId::Narrator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuntZhang => "aunt_zhang",
            Self::CeoLi => "ceo_li",
            Self::DrChen => "dr_chen",
            Self::GovOfficer => "gov_officer",
            Self::Narrator => "narrator",
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|persona| persona.as_str() == normalized)
            .ok_or_else(|| format!("unknown persona: {raw}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceId {
    ResidentPetition,
    NoiseComplaints,
    DeveloperRoiSheet,
    InvestorTermSheet,
    CarbonAssessment,
    HeatIslandReport,
    ZoningGuidelines,
    BudgetAuditNote,
}

impl EvidenceId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResidentPetition => "resident_petition",
            Self::NoiseComplaints => "noise_complaints",
            Self::DeveloperRoiSheet => "developer_roi_sheet",
            Self::InvestorTermSheet => "investor_term_sheet",
            Self::CarbonAssessment => "carbon_assessment",
            Self::HeatIslandReport => "heat_island_report",
            Self::ZoningGuidelines => "zoning_guidelines",
            Self::BudgetAuditNote => "budget_audit_note",
        }
    }
}

pub const USER_SENDER_ID: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub channel_id: PersonaId,
    pub content: String,
    #[serde(default)]
    pub evidence_ids: Vec<EvidenceId>,
    pub turn: u32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub sentiment: Sentiment,
    pub turn: u32,
    pub timestamp_ms: u64,
}

/// Itemized hard-constraint failure, reported in evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintViolation {
    InsufficientBudget {
        projected_cost: i64,
        budget: i64,
        deficit: i64,
    },
    ResidentialRedlineViolation {
        current: usize,
        required: usize,
    },
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBudget {
                projected_cost,
                budget,
                deficit,
            } => write!(
                f,
                "insufficient budget: projected cost {projected_cost}k exceeds remaining budget {budget}k by {deficit}k"
            ),
            Self::ResidentialRedlineViolation { current, required } => write!(
                f,
                "residential redline violated: {current} residential cells, at least {required} required"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GameNotFound,
    InvalidAction,
    InvalidQuery,
    InvalidCellId,
    InvalidCellType,
    PhaseConflict,
    ConstraintViolation,
    UnknownPersona,
    ContractVersionUnsupported,
    EngineBusy,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
            violations: Vec::new(),
        }
    }

    pub fn with_violations(mut self, violations: Vec<ConstraintViolation>) -> Self {
        self.violations = violations;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Advance,
    SetCellType {
        cell_id: String,
        cell_type: String,
    },
    SubmitProposal {
        strategy_text: String,
    },
    RequestApproval {
        #[serde(default)]
        strategy_text: Option<String>,
    },
    Revise,
    Chat {
        persona_id: String,
        text: String,
    },
    Reset,
}

impl ActionPayload {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::SetCellType { .. } => "set_cell_type",
            Self::SubmitProposal { .. } => "submit_proposal",
            Self::RequestApproval { .. } => "request_approval",
            Self::Revise => "revise",
            Self::Chat { .. } => "chat",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerAction {
    pub schema_version: String,
    pub action_id: String,
    pub game_id: String,
    pub payload: ActionPayload,
}

impl PlayerAction {
    pub fn new(
        action_id: impl Into<String>,
        game_id: impl Into<String>,
        payload: ActionPayload,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            action_id: action_id.into(),
            game_id: game_id.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub schema_version: String,
    pub action_id: String,
    pub game_id: String,
    pub action_type: String,
    pub accepted: bool,
    pub phase: Phase,
    pub error: Option<ApiError>,
    pub outcome: Option<Value>,
}

impl ActionResult {
    pub fn accepted(action: &PlayerAction, phase: Phase, outcome: Option<Value>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            action_id: action.action_id.clone(),
            game_id: action.game_id.clone(),
            action_type: action.payload.action_type().to_string(),
            accepted: true,
            phase,
            error: None,
            outcome,
        }
    }

    pub fn rejected(action: &PlayerAction, phase: Phase, error: ApiError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            action_id: action.action_id.clone(),
            game_id: action.game_id.clone(),
            action_type: action.payload.action_type().to_string(),
            accepted: false,
            phase,
            error: Some(error),
            outcome: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub schema_version: String,
    pub query_type: String,
    pub game_id: String,
    pub generated_at_turn: u32,
    pub data: Value,
}
