//! Text collaborators backed by an [`LlmCompletionClient`].
//!
//! Prompts only ever carry the read-only state summary plus persona and evidence descriptors.

use contracts::StateSummary;
use kernel_core::{
    ApprovalAdvisor, CollaboratorError, DialogueCollaborator, DialogueContext, DiffSummary,
    NarrativeCollaborator,
};
use serde_json::Value;

use crate::llm::{LlmCompletionClient, LlmCompletionRequest, LlmMessage};

const DIALOGUE_TEMPERATURE: f32 = 0.7;
const APPROVAL_TEMPERATURE: f32 = 0.1;
const NARRATIVE_TEMPERATURE: f32 = 0.7;

pub fn summarize_state(summary: &StateSummary) -> String {
    format!(
        "Current state: satisfaction {}, economy {}, environment {}; remaining budget {}k; turn {}/{}; phase {}.",
        summary.metrics.satisfaction,
        summary.metrics.economy,
        summary.metrics.environment,
        summary.budget,
        summary.turn,
        summary.max_turns,
        summary.phase
    )
}

fn dialogue_prompt(context: &DialogueContext<'_>) -> String {
    let persona = context.persona;
    let evidence = if context.evidence.is_empty() {
        "none".to_string()
    } else {
        context
            .evidence
            .iter()
            .map(|doc| format!("\"{}\" (summary: {})", doc.title, doc.summary))
            .collect::<Vec<_>>()
            .join("; ")
    };
    format!(
        "You are playing a character in an urban-renewal simulation game.\n\
         Name: {name}\n\
         Role: {role}\n\
         Personality: {description}\n\
         Public stance: {stance}\n\
         Private preference (known only to you): {hidden}\n\n\
         {state}\n\n\
         Reply to the player (the city planner) in character.\n\
         1. Stay true to the persona and speak the way {name} would.\n\
         2. React to the current metrics, for example a tight budget or low satisfaction.\n\
         3. Evidence documents you can offer this turn: {evidence}. If it fits, tell the player you can share them.\n\
         4. Keep the reply under 100 words.",
        name = persona.name,
        role = persona.role,
        description = persona.description,
        stance = persona.public_stance,
        hidden = persona.hidden_preference,
        state = summarize_state(context.summary),
        evidence = evidence,
    )
}

const APPROVAL_PROMPT: &str = "You are Section Chief Wang, the government approval officer. Decide whether the \
city-renewal proposal described by the strategy statement may proceed.\n\
Criteria (guidance only, do not nitpick wording):\n\
1. Reasonableness: does the plan follow a clear logic, e.g. parks for the environment, factories for the economy?\n\
2. Completeness: does the statement roughly explain the changes on the map?\n\
Reject statements that are empty, gibberish or plainly harmful (e.g. \"evict everyone\"). Otherwise approve any \
reasonable planning intent; players learn by doing.\n\
Return JSON only: {\"approved\": boolean, \"reasons\": [string], \"missing_points\": [string]}";

fn narrative_prompt(diff: &DiffSummary, strategy_text: &str) -> String {
    let strategy = if strategy_text.trim().is_empty() {
        "no additional strategy"
    } else {
        strategy_text
    };
    format!(
        "You are the commentator of a city-planning simulator. Using the computed changes below, write a short \
         news briefing and summary.\n\
         Zone changes: residential {res:+}, factory {fac:+}, park {park:+}, commercial {com:+}.\n\
         Metric deltas: satisfaction {sat:+}, economy {eco:+}, environment {env:+}; budget {budget:+}k.\n\
         {state}\n\
         Player strategy: {strategy}\n\
         Return JSON only: {{\"narrative\": string (under 80 words, explain why the metrics moved), \
         \"news\": [{{\"title\": string, \"content\": string, \"sentiment\": \"positive\" | \"negative\" | \"neutral\"}}]}}. \
         Write two news items: one on residents and public opinion, one on the economy and policy.",
        res = diff.type_deltas.residential,
        fac = diff.type_deltas.factory,
        park = diff.type_deltas.park,
        com = diff.type_deltas.commercial,
        sat = diff.metric_delta.satisfaction,
        eco = diff.metric_delta.economy,
        env = diff.metric_delta.environment,
        budget = diff.budget_delta,
        state = summarize_state(&diff.state),
        strategy = strategy,
    )
}

/// Providers sometimes wrap JSON in a markdown fence even in JSON mode.
pub fn parse_json_reply(raw: &str) -> Result<Value, CollaboratorError> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|body| body.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(unfenced)
        .map_err(|err| CollaboratorError::Malformed(format!("reply is not JSON: {err}")))
}

#[derive(Debug)]
pub struct LlmCollaborators<C> {
    client: C,
}

impl<C: LlmCompletionClient> LlmCollaborators<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn complete(
        &self,
        messages: Vec<LlmMessage>,
        temperature: f32,
        json_output: bool,
    ) -> Result<String, CollaboratorError> {
        let request = LlmCompletionRequest {
            messages,
            temperature: Some(temperature),
            json_output,
        };
        self.client.complete(&request).map_err(CollaboratorError::from)
    }
}

impl<C: LlmCompletionClient> DialogueCollaborator for LlmCollaborators<C> {
    fn generate_reply(
        &self,
        context: &DialogueContext<'_>,
        user_text: &str,
    ) -> Result<String, CollaboratorError> {
        self.complete(
            vec![
                LlmMessage::system(dialogue_prompt(context)),
                LlmMessage::user(user_text),
            ],
            DIALOGUE_TEMPERATURE,
            false,
        )
    }
}

impl<C: LlmCompletionClient> ApprovalAdvisor for LlmCollaborators<C> {
    fn generate_approval_verdict(
        &self,
        strategy_text: &str,
        summary: &StateSummary,
    ) -> Result<Value, CollaboratorError> {
        let reply = self.complete(
            vec![
                LlmMessage::system(APPROVAL_PROMPT),
                LlmMessage::user(format!(
                    "{}\nStrategy statement: {}",
                    summarize_state(summary),
                    strategy_text
                )),
            ],
            APPROVAL_TEMPERATURE,
            true,
        )?;
        parse_json_reply(&reply)
    }
}

impl<C: LlmCompletionClient> NarrativeCollaborator for LlmCollaborators<C> {
    fn generate_turn_narrative(
        &self,
        diff: &DiffSummary,
        strategy_text: &str,
    ) -> Result<Value, CollaboratorError> {
        let reply = self.complete(
            vec![LlmMessage::system(narrative_prompt(diff, strategy_text))],
            NARRATIVE_TEMPERATURE,
            true,
        )?;
        parse_json_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use contracts::{GameConfig, PersonaId};
    use kernel_core::personas::{evidence, persona};
    use kernel_core::TurnEngine;
    use serde_json::json;

    use super::*;
    use crate::llm::{LlmClientError, LlmRole};

    struct RecordingClient {
        reply: Result<String, LlmClientError>,
        requests: Mutex<Vec<LlmCompletionRequest>>,
    }

    impl RecordingClient {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmCompletionClient for RecordingClient {
        fn complete(&self, request: &LlmCompletionRequest) -> Result<String, LlmClientError> {
            self.requests
                .lock()
                .expect("request log lock")
                .push(request.clone());
            self.reply.clone()
        }
    }

    fn summary() -> StateSummary {
        TurnEngine::new(GameConfig::default())
            .expect("valid config")
            .summary()
    }

    #[test]
    fn dialogue_prompt_carries_persona_and_evidence() {
        let collaborators = LlmCollaborators::new(RecordingClient::answering("Fine, fine."));
        let docs = [evidence(contracts::EvidenceId::NoiseComplaints)];
        let summary = summary();
        let context = DialogueContext {
            persona: persona(PersonaId::AuntZhang),
            evidence: &docs,
            summary: &summary,
        };
        let reply = collaborators
            .generate_reply(&context, "Is it loud?")
            .expect("scripted reply");
        assert_eq!(reply, "Fine, fine.");

        let requests = collaborators.client.requests.lock().expect("lock");
        let request = &requests[0];
        assert!(!request.json_output);
        assert_eq!(request.messages[0].role, LlmRole::System);
        assert!(request.messages[0].content.contains("Aunt Zhang"));
        assert!(request.messages[0]
            .content
            .contains("Noise and disturbance complaints"));
        assert!(request.messages[0].content.contains("remaining budget 1000k"));
        assert_eq!(request.messages[1].content, "Is it loud?");
    }

    #[test]
    fn approval_reply_is_parsed_from_fenced_json() {
        let collaborators = LlmCollaborators::new(RecordingClient::answering(
            "```json\n{\"approved\": true, \"reasons\": [\"Clear intent.\"]}\n```",
        ));
        let verdict = collaborators
            .generate_approval_verdict("Plant trees along the river", &summary())
            .expect("valid json");
        assert_eq!(verdict, json!({"approved": true, "reasons": ["Clear intent."]}));
        let requests = collaborators.client.requests.lock().expect("lock");
        assert!(requests[0].json_output);
        assert_eq!(requests[0].temperature, Some(APPROVAL_TEMPERATURE));
    }

    #[test]
    fn non_json_reply_is_malformed() {
        let collaborators = LlmCollaborators::new(RecordingClient::answering("Approved!"));
        let err = collaborators
            .generate_approval_verdict("Plant trees", &summary())
            .expect_err("not json");
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }

    #[test]
    fn provider_status_error_is_unavailable() {
        let collaborators = LlmCollaborators::new(RecordingClient {
            reply: Err(LlmClientError::HttpStatus {
                code: 429,
                message: "rate limited".to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        });
        let summary = summary();
        let context = DialogueContext {
            persona: persona(PersonaId::CeoLi),
            evidence: &[],
            summary: &summary,
        };
        assert!(matches!(
            collaborators.generate_reply(&context, "ROI?"),
            Err(CollaboratorError::Unavailable(_))
        ));
    }
}
