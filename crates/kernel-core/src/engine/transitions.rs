use super::*;

use contracts::{Cell, CellType, USER_SENDER_ID};
use tracing::warn;

use crate::approval::{check_hard_constraints, soft_verdict};
use crate::collab::{DialogueContext, DiffSummary};
use crate::narrative::narrate_turn;
use crate::personas::{evidence, persona, pick_evidence, EvidenceDoc, PLAYER_NAME};

impl TurnEngine {
    /// `investigation -> proposal`, or `iteration -> investigation | ended`.
    pub fn advance(&mut self) -> Result<Phase, EngineError> {
        match self.phase {
            Phase::Investigation => self.transition(Phase::Proposal),
            Phase::Iteration => {
                self.turn += 1;
                if self.turn > self.config.max_turns {
                    self.transition(Phase::Ended);
                    self.log_game_end();
                } else {
                    self.transition(Phase::Investigation);
                    self.strategy_text.clear();
                    self.log_turn_start();
                }
            }
            phase => {
                return Err(EngineError::PhaseConflict {
                    phase,
                    operation: "advance",
                })
            }
        }
        Ok(self.phase)
    }

    pub fn edit_cell(&mut self, cell_id: &str, cell_type: CellType) -> Result<Cell, EngineError> {
        if !self.phase.allows_grid_edit() {
            return Err(EngineError::PhaseConflict {
                phase: self.phase,
                operation: "edit_cell",
            });
        }
        let next = self.grid.set_cell_type(cell_id, cell_type)?;
        self.grid = next;
        self.grid
            .cell(cell_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidCellId(cell_id.to_string()))
    }

    /// Like [`TurnEngine::edit_cell`] but takes the raw wire label.
    pub fn set_cell_type(&mut self, cell_id: &str, raw_type: &str) -> Result<Cell, EngineError> {
        let cell_type: CellType = raw_type
            .parse()
            .map_err(|_| EngineError::InvalidCellType(raw_type.to_string()))?;
        self.edit_cell(cell_id, cell_type)
    }

    /// `proposal -> approval`, guarded by both hard constraints.
    pub fn submit_proposal(
        &mut self,
        strategy_text: &str,
    ) -> Result<HardConstraintReport, EngineError> {
        self.require_phase(Phase::Proposal, "submit_proposal")?;
        let report = check_hard_constraints(&self.grid, &self.snapshot, self.budget, &self.policy)?;
        if !report.is_clean() {
            warn!(
                game_id = %self.config.game_id,
                turn = self.turn,
                violations = report.violations.len(),
                "proposal blocked by hard constraints"
            );
            self.log_rejection(&ApprovalVerdict::from_hard_constraints(&report));
            return Err(EngineError::ConstraintViolations(report.violations));
        }
        self.strategy_text = strategy_text.trim().to_string();
        self.transition(Phase::Approval);
        Ok(report)
    }

    /// Soft tier of the gate. Approval moves to `simulation`; rejection stays in `approval`.
    pub fn request_approval(
        &mut self,
        strategy_text: Option<&str>,
        advisor: &dyn ApprovalAdvisor,
    ) -> Result<ApprovalVerdict, EngineError> {
        self.require_phase(Phase::Approval, "request_approval")?;
        if let Some(text) = strategy_text {
            self.strategy_text = text.trim().to_string();
        }
        let summary = self.summary();
        let verdict = soft_verdict(
            advisor,
            &self.strategy_text,
            &summary,
            self.config.min_strategy_chars,
        );
        if verdict.approved {
            self.log_approval(&verdict);
            self.transition(Phase::Simulation);
        } else {
            info!(
                game_id = %self.config.game_id,
                turn = self.turn,
                source = ?verdict.source,
                "proposal rejected by advisory review"
            );
            self.log_rejection(&verdict);
        }
        Ok(verdict)
    }

    /// `approval -> proposal`; always allowed from `approval`.
    pub fn revise(&mut self) -> Result<Phase, EngineError> {
        self.require_phase(Phase::Approval, "revise")?;
        self.transition(Phase::Proposal);
        Ok(self.phase)
    }

    /// Scores the turn, commits the snapshot and lands in `iteration`. The narrative is
    /// requested only after the numbers are applied, so it cannot block or alter them.
    pub fn run_simulation(
        &mut self,
        narrator: &dyn NarrativeCollaborator,
    ) -> Result<TurnReport, EngineError> {
        self.require_phase(Phase::Simulation, "run_simulation")?;
        let diff = compute_diff(&self.snapshot, &self.grid, &self.strategy_text, &self.policy)?;

        let metrics_before = self.metrics;
        let budget_before = self.budget;
        self.metrics.apply(&diff.metric_delta);
        assert!(
            self.metrics.is_within_bounds(),
            "metrics escaped [0, 100]: {:?}",
            self.metrics
        );
        self.budget = self.budget.saturating_add(diff.budget_delta);
        self.snapshot = self.grid.clone();
        self.transition(Phase::Iteration);

        let diff_summary = DiffSummary {
            turn: self.turn,
            type_deltas: diff.deltas,
            metric_delta: diff.metric_delta,
            budget_delta: diff.budget_delta,
            state: self.summary(),
        };
        let narrative = narrate_turn(narrator, &diff_summary, &self.strategy_text);
        self.log_simulation(&narrative);

        let report = TurnReport {
            turn: self.turn,
            strategy_text: self.strategy_text.clone(),
            diff,
            metrics_before,
            metrics_after: self.metrics,
            budget_before,
            budget_after: self.budget,
            narrative,
        };
        info!(
            game_id = %self.config.game_id,
            turn = self.turn,
            changed_cells = report.diff.has_changes(),
            budget = self.budget,
            satisfaction = self.metrics.satisfaction,
            economy = self.metrics.economy,
            environment = self.metrics.environment,
            "turn committed"
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Logs the user's line and the persona's reply in the persona's channel.
    pub fn chat(
        &mut self,
        persona_id: PersonaId,
        text: &str,
        dialogue: &dyn DialogueCollaborator,
    ) -> Result<ChatExchange, EngineError> {
        let profile = persona(persona_id);
        if !profile.is_chattable() {
            return Err(EngineError::PersonaNotChattable(persona_id));
        }
        if !self.phase.allows_dialogue() {
            return Err(EngineError::PhaseConflict {
                phase: self.phase,
                operation: "chat",
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyMessage);
        }

        let user_message = self.append_message(
            USER_SENDER_ID,
            PLAYER_NAME,
            persona_id,
            text.to_string(),
            Vec::new(),
        );

        let evidence_ids = pick_evidence(persona_id, text);
        let docs: Vec<&'static EvidenceDoc> = evidence_ids.iter().map(|id| evidence(*id)).collect();
        let summary = self.summary();
        let context = DialogueContext {
            persona: profile,
            evidence: &docs,
            summary: &summary,
        };
        let (content, attached, degraded) = match dialogue.generate_reply(&context, text) {
            Ok(reply) if !reply.trim().is_empty() => (reply, evidence_ids, false),
            Ok(_) => (format!("{}: (silent...)", profile.name), evidence_ids, false),
            Err(err) => {
                warn!(persona = %persona_id, error = %err, "dialogue collaborator failed");
                (
                    format!("{}: (system busy, please try again later)", profile.name),
                    Vec::new(),
                    true,
                )
            }
        };
        let reply =
            self.append_message(persona_id.as_str(), profile.name, persona_id, content, attached);

        Ok(ChatExchange {
            user_message,
            reply,
            degraded,
        })
    }
}
