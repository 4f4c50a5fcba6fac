use super::*;

use contracts::{EvidenceId, Sentiment};

use crate::narrative::NewsDraft;
use crate::personas::persona;

impl TurnEngine {
    /// Strictly increasing even when the wall clock stalls or steps back.
    fn next_timestamp(&mut self) -> u64 {
        let timestamp = now_ms().max(self.last_timestamp_ms + 1);
        self.last_timestamp_ms = timestamp;
        timestamp
    }

    pub(super) fn append_message(
        &mut self,
        sender_id: &str,
        sender_name: &str,
        channel_id: PersonaId,
        content: String,
        evidence_ids: Vec<EvidenceId>,
    ) -> ChatMessage {
        self.message_sequence += 1;
        let message = ChatMessage {
            id: format!("msg-{:06}", self.message_sequence),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            channel_id,
            content,
            evidence_ids,
            turn: self.turn,
            timestamp_ms: self.next_timestamp(),
        };
        self.messages.push(message.clone());
        message
    }

    pub(super) fn append_news(&mut self, draft: &NewsDraft) -> NewsItem {
        self.news_sequence += 1;
        let item = NewsItem {
            id: format!("news-{:06}", self.news_sequence),
            title: draft.title.clone(),
            content: draft.content.clone(),
            sentiment: draft.sentiment,
            turn: self.turn,
            timestamp_ms: self.next_timestamp(),
        };
        self.news.push(item.clone());
        item
    }

    fn persona_says(&mut self, speaker: PersonaId, content: String) -> ChatMessage {
        let name = persona(speaker).name;
        self.append_message(speaker.as_str(), name, speaker, content, Vec::new())
    }

    pub(super) fn log_welcome(&mut self) {
        let content = format!(
            "Welcome, planner. The Old Banyan Street renewal starts now: {} turns, a {}k budget, and four stakeholders waiting to be heard. Investigate first, then draw your proposal.",
            self.config.max_turns, self.config.initial_budget
        );
        self.persona_says(PersonaId::Narrator, content);
    }

    pub(super) fn log_rejection(&mut self, verdict: &ApprovalVerdict) {
        let mut content = String::from("The proposal cannot be approved yet:");
        for reason in &verdict.reasons {
            content.push_str("\n- ");
            content.push_str(reason);
        }
        let officer = PersonaId::GovOfficer;
        let name = persona(officer).name;
        self.append_message(
            officer.as_str(),
            name,
            officer,
            content,
            verdict.suggested_evidence.clone(),
        );
        self.append_news(&NewsDraft {
            title: "Approval notice".to_string(),
            content: "The renewal proposal was sent back for revision.".to_string(),
            sentiment: Sentiment::Neutral,
        });
    }

    pub(super) fn log_approval(&mut self, verdict: &ApprovalVerdict) {
        let content = format!("Approved. {}", verdict.reasons.join(" "));
        self.persona_says(PersonaId::GovOfficer, content);
    }

    pub(super) fn log_simulation(&mut self, narrative: &NarrativeDraft) {
        self.persona_says(PersonaId::Narrator, narrative.narrative.clone());
        let strategy = if self.strategy_text.is_empty() {
            "no written strategy".to_string()
        } else {
            self.strategy_text.clone()
        };
        self.append_news(&NewsDraft {
            title: "Proposal enters execution".to_string(),
            content: format!("Strategy on file: \"{strategy}\""),
            sentiment: Sentiment::Neutral,
        });
        for draft in &narrative.news {
            self.append_news(draft);
        }
    }

    pub(super) fn log_turn_start(&mut self) {
        let content = format!(
            "Turn {} of {} begins. Budget left: {}k.",
            self.turn, self.config.max_turns, self.budget
        );
        self.persona_says(PersonaId::Narrator, content);
    }

    pub(super) fn log_game_end(&mut self) {
        let content = format!(
            "The renewal term is over. Final satisfaction {}, economy {}, environment {}, budget {}k.",
            self.metrics.satisfaction, self.metrics.economy, self.metrics.environment, self.budget
        );
        self.persona_says(PersonaId::Narrator, content);
    }
}
