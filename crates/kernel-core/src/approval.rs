//! Two-tier approval gate: hard constraints first, then the advisory verdict.

use contracts::{CellType, ConstraintViolation, EvidenceId, StateSummary};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::collab::{ApprovalAdvisor, CollaboratorError};
use crate::diff::{projected_cost, CostPolicy};
use crate::grid::{Grid, GridError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardConstraintReport {
    pub projected_cost: i64,
    pub budget: i64,
    pub residential_current: usize,
    pub residential_required: usize,
    pub violations: Vec<ConstraintViolation>,
}

impl HardConstraintReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Evaluates budget solvency then residential non-regression against the committed snapshot.
/// Both are always evaluated so the caller gets every violated constraint at once.
pub fn check_hard_constraints(
    grid: &Grid,
    snapshot: &Grid,
    budget: i64,
    policy: &CostPolicy,
) -> Result<HardConstraintReport, GridError> {
    let cost = projected_cost(snapshot, grid, policy)?;
    let residential_current = grid.count(CellType::Residential);
    let residential_required = snapshot.count(CellType::Residential);

    let mut violations = Vec::new();
    if cost > budget {
        violations.push(ConstraintViolation::InsufficientBudget {
            projected_cost: cost,
            budget,
            deficit: cost.saturating_sub(budget),
        });
    }
    if residential_current < residential_required {
        violations.push(ConstraintViolation::ResidentialRedlineViolation {
            current: residential_current,
            required: residential_required,
        });
    }

    Ok(HardConstraintReport {
        projected_cost: cost,
        budget,
        residential_current,
        residential_required,
        violations,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    HardConstraints,
    Advisor,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalVerdict {
    pub approved: bool,
    pub reasons: Vec<String>,
    pub source: VerdictSource,
    pub violations: Vec<ConstraintViolation>,
    pub suggested_evidence: Vec<EvidenceId>,
}

impl ApprovalVerdict {
    pub fn from_hard_constraints(report: &HardConstraintReport) -> Self {
        let mut suggested_evidence = Vec::new();
        for violation in &report.violations {
            let doc = match violation {
                ConstraintViolation::InsufficientBudget { .. } => EvidenceId::BudgetAuditNote,
                ConstraintViolation::ResidentialRedlineViolation { .. } => {
                    EvidenceId::ResidentPetition
                }
            };
            suggested_evidence.push(doc);
        }
        Self {
            approved: report.is_clean(),
            reasons: report.violations.iter().map(ToString::to_string).collect(),
            source: VerdictSource::HardConstraints,
            violations: report.violations.clone(),
            suggested_evidence,
        }
    }
}

const DEFAULT_APPROVED_REASON: &str = "Approved by the review office.";
const DEFAULT_REJECTED_REASON: &str = "Rejected by the review office without further comment.";

/// Strict shape check: `approved` must be a bool; `reasons`, when present, a list of strings.
pub fn parse_verdict(raw: &Value) -> Result<ApprovalVerdict, CollaboratorError> {
    let object = raw
        .as_object()
        .ok_or_else(|| CollaboratorError::Malformed("verdict is not a JSON object".to_string()))?;
    let approved = object
        .get("approved")
        .and_then(Value::as_bool)
        .ok_or_else(|| CollaboratorError::Malformed("`approved` must be a boolean".to_string()))?;

    let mut reasons = match object.get("reasons") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CollaboratorError::Malformed("`reasons` must only contain strings".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(CollaboratorError::Malformed(
                "`reasons` must be a list of strings".to_string(),
            ))
        }
    };
    if reasons.is_empty() {
        let default = if approved {
            DEFAULT_APPROVED_REASON
        } else {
            DEFAULT_REJECTED_REASON
        };
        reasons.push(default.to_string());
    }

    let mut suggested_evidence = Vec::new();
    if let Some(points) = object.get("missing_points").and_then(Value::as_array) {
        let points: Vec<String> = points
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect();
        if points.iter().any(|point| point.contains("compliance")) {
            suggested_evidence.push(EvidenceId::ZoningGuidelines);
        }
        if points.iter().any(|point| point.contains("risk")) {
            suggested_evidence.push(EvidenceId::NoiseComplaints);
        }
    }

    Ok(ApprovalVerdict {
        approved,
        reasons,
        source: VerdictSource::Advisor,
        violations: Vec::new(),
        suggested_evidence,
    })
}

/// Local rule used when the advisor cannot answer: only a missing plan is rejected.
pub fn fallback_verdict(strategy_text: &str, min_strategy_chars: usize) -> ApprovalVerdict {
    let length = strategy_text.trim().chars().count();
    let (approved, reason) = if length < min_strategy_chars {
        (
            false,
            "The strategy statement is too short; briefly describe your planning intent.",
        )
    } else {
        (true, "Approved on manual review (advisory service offline).")
    };
    ApprovalVerdict {
        approved,
        reasons: vec![reason.to_string()],
        source: VerdictSource::Fallback,
        violations: Vec::new(),
        suggested_evidence: Vec::new(),
    }
}

/// Soft tier. Only call this once the hard constraints are clean.
pub fn soft_verdict(
    advisor: &dyn ApprovalAdvisor,
    strategy_text: &str,
    summary: &StateSummary,
    min_strategy_chars: usize,
) -> ApprovalVerdict {
    let parsed = advisor
        .generate_approval_verdict(strategy_text, summary)
        .and_then(|raw| parse_verdict(&raw));
    match parsed {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(error = %err, "approval advisor failed; using local fallback");
            fallback_verdict(strategy_text, min_strategy_chars)
        }
    }
}
