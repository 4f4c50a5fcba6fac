//! Narrow interfaces to the text-generating collaborators.
//!
//! Collaborators only ever see read-only summaries. Their output is either logged verbatim
//! (dialogue) or validated by the engine before use (approval verdicts, narratives).

use std::fmt;

use contracts::{EvidenceId, StateSummary};
use serde::Serialize;
use serde_json::Value;

use crate::diff::TypeCounts;
use crate::personas::{EvidenceDoc, Persona};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No service configured, transport failure or non-success status.
    Unavailable(String),
    /// The provider answered but refused or errored.
    Provider(String),
    /// The provider answered with something that does not fit the expected shape.
    Malformed(String),
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "collaborator unavailable: {reason}"),
            Self::Provider(reason) => write!(f, "collaborator provider error: {reason}"),
            Self::Malformed(reason) => write!(f, "collaborator returned malformed output: {reason}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Structured input for the narrative collaborator. Numbers are final when this is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub turn: u32,
    pub type_deltas: TypeCounts,
    pub metric_delta: contracts::MetricDelta,
    pub budget_delta: i64,
    pub state: StateSummary,
}

#[derive(Debug, Clone, Copy)]
pub struct DialogueContext<'a> {
    pub persona: &'a Persona,
    pub evidence: &'a [&'static EvidenceDoc],
    pub summary: &'a StateSummary,
}

impl DialogueContext<'_> {
    pub fn evidence_ids(&self) -> Vec<EvidenceId> {
        self.evidence.iter().map(|doc| doc.id).collect()
    }
}

pub trait DialogueCollaborator {
    fn generate_reply(
        &self,
        context: &DialogueContext<'_>,
        user_text: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Expected to return `{"approved": bool, "reasons": [string]}`; the engine validates it.
pub trait ApprovalAdvisor {
    fn generate_approval_verdict(
        &self,
        strategy_text: &str,
        summary: &StateSummary,
    ) -> Result<Value, CollaboratorError>;
}

/// Expected to return `{"narrative": string, "news": [{title, content, sentiment}]}`.
pub trait NarrativeCollaborator {
    fn generate_turn_narrative(
        &self,
        diff: &DiffSummary,
        strategy_text: &str,
    ) -> Result<Value, CollaboratorError>;
}

/// Stand-in used when no text service is configured: every call is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCollaborator;

impl OfflineCollaborator {
    fn unavailable<T>() -> Result<T, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no text service configured".to_string(),
        ))
    }
}

impl DialogueCollaborator for OfflineCollaborator {
    fn generate_reply(
        &self,
        _context: &DialogueContext<'_>,
        _user_text: &str,
    ) -> Result<String, CollaboratorError> {
        Self::unavailable()
    }
}

impl ApprovalAdvisor for OfflineCollaborator {
    fn generate_approval_verdict(
        &self,
        _strategy_text: &str,
        _summary: &StateSummary,
    ) -> Result<Value, CollaboratorError> {
        Self::unavailable()
    }
}

impl NarrativeCollaborator for OfflineCollaborator {
    fn generate_turn_narrative(
        &self,
        _diff: &DiffSummary,
        _strategy_text: &str,
    ) -> Result<Value, CollaboratorError> {
        Self::unavailable()
    }
}
