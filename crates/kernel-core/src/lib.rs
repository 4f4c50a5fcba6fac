//! Deterministic turn engine for the urban-renewal simulator: grid model, diff and cost
//! scoring, the two-tier approval gate and the phase state machine.

pub mod approval;
pub mod collab;
pub mod diff;
pub mod engine;
pub mod grid;
pub mod narrative;
pub mod personas;
pub mod rules;

pub use approval::{ApprovalVerdict, HardConstraintReport, VerdictSource};
pub use collab::{
    ApprovalAdvisor, CollaboratorError, DialogueCollaborator, DialogueContext, DiffSummary,
    NarrativeCollaborator, OfflineCollaborator,
};
pub use diff::{compute_diff, CostPolicy, DiffOutcome, TypeCounts};
pub use engine::{ChatExchange, EngineError, ProposalPreview, TurnEngine, TurnReport};
pub use grid::{create_grid, Grid, GridError};
pub use narrative::{NarrativeDraft, NarrativeSource, NewsDraft};
