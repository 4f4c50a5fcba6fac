//! Turn narrative validation and the deterministic fallback.

use contracts::{MetricDelta, Sentiment};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::collab::{CollaboratorError, DiffSummary, NarrativeCollaborator};

/// News items from the fallback fire at or beyond these per-turn deltas.
pub const HEADLINE_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    pub sentiment: Sentiment,
}

impl NewsDraft {
    fn new(title: &str, content: &str, sentiment: Sentiment) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            sentiment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Collaborator,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeDraft {
    pub narrative: String,
    pub news: Vec<NewsDraft>,
    pub source: NarrativeSource,
}

/// Accepts `{"narrative": string, "news": [...]}`. News entries without a title and content
/// are dropped and unknown sentiments become neutral. Any other keys, including metric
/// suggestions, are ignored.
pub fn parse_narrative(raw: &Value) -> Result<NarrativeDraft, CollaboratorError> {
    let object = raw
        .as_object()
        .ok_or_else(|| CollaboratorError::Malformed("narrative is not a JSON object".to_string()))?;
    let narrative = object
        .get("narrative")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            CollaboratorError::Malformed("`narrative` must be a non-empty string".to_string())
        })?
        .to_string();

    let news = object
        .get("news")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_news_item).collect())
        .unwrap_or_default();

    Ok(NarrativeDraft {
        narrative,
        news,
        source: NarrativeSource::Collaborator,
    })
}

fn parse_news_item(item: &Value) -> Option<NewsDraft> {
    let title = item.get("title").and_then(Value::as_str)?.trim();
    let content = item.get("content").and_then(Value::as_str)?.trim();
    if title.is_empty() || content.is_empty() {
        return None;
    }
    let sentiment = item
        .get("sentiment")
        .and_then(Value::as_str)
        .map(Sentiment::from_label)
        .unwrap_or(Sentiment::Neutral);
    Some(NewsDraft::new(title, content, sentiment))
}

pub fn canned_narrative(delta: &MetricDelta, budget_delta: i64) -> String {
    format!(
        "This turn's changes moved satisfaction by {:+}, economy by {:+} and environment by {:+}; budget changed by {:+}k.",
        delta.satisfaction, delta.economy, delta.environment, budget_delta
    )
}

/// Headlines keyed off the metric thresholds; always yields at least one item.
pub fn fallback_news(delta: &MetricDelta) -> Vec<NewsDraft> {
    let mut news = Vec::new();
    if delta.economy >= HEADLINE_THRESHOLD {
        news.push(NewsDraft::new(
            "Investor confidence rebounds",
            "Investors see real potential for the renewal plan to lift local industry.",
            Sentiment::Positive,
        ));
    }
    if delta.satisfaction <= -HEADLINE_THRESHOLD {
        news.push(NewsDraft::new(
            "Resident concerns mount",
            "Some residents voice worries about construction disruption and relocation arrangements.",
            Sentiment::Negative,
        ));
    }
    if delta.environment >= HEADLINE_THRESHOLD {
        news.push(NewsDraft::new(
            "Greener streets ahead",
            "Environmental groups welcome the new green space and expect cooler summers.",
            Sentiment::Positive,
        ));
    }
    if delta.environment <= -HEADLINE_THRESHOLD {
        news.push(NewsDraft::new(
            "Pollution worries grow",
            "Monitoring stations flag rising emissions as development intensifies.",
            Sentiment::Negative,
        ));
    }
    if news.is_empty() {
        news.push(NewsDraft::new(
            "Renewal under way",
            "The plan has entered execution; its effects are still unfolding.",
            Sentiment::Neutral,
        ));
    }
    news
}

pub fn fallback_narrative(diff: &DiffSummary) -> NarrativeDraft {
    NarrativeDraft {
        narrative: canned_narrative(&diff.metric_delta, diff.budget_delta),
        news: fallback_news(&diff.metric_delta),
        source: NarrativeSource::Fallback,
    }
}

/// Never fails: any collaborator problem degrades to the canned narrative.
pub fn narrate_turn(
    narrator: &dyn NarrativeCollaborator,
    diff: &DiffSummary,
    strategy_text: &str,
) -> NarrativeDraft {
    let parsed = narrator
        .generate_turn_narrative(diff, strategy_text)
        .and_then(|raw| parse_narrative(&raw));
    match parsed {
        Ok(draft) => draft,
        Err(err) => {
            warn!(error = %err, turn = diff.turn, "narrative collaborator failed; using canned narrative");
            fallback_narrative(diff)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_keeps_valid_news_and_normalizes_sentiment() {
        let draft = parse_narrative(&json!({
            "narrative": "The old factory is gone.",
            "news": [
                {"title": "Jobs lost", "content": "Workers worry.", "sentiment": "furious"},
                {"title": "", "content": "no title"},
                {"content": "missing title"},
                {"title": "Park opens", "content": "Families gather.", "sentiment": "positive"}
            ],
            "metric_adjustment": {"economy": 50}
        }))
        .expect("valid narrative");
        assert_eq!(draft.news.len(), 2);
        assert_eq!(draft.news[0].sentiment, Sentiment::Neutral);
        assert_eq!(draft.news[1].sentiment, Sentiment::Positive);
        assert_eq!(draft.source, NarrativeSource::Collaborator);
    }

    #[test]
    fn parse_rejects_missing_narrative() {
        assert!(parse_narrative(&json!({"news": []})).is_err());
        assert!(parse_narrative(&json!("just text")).is_err());
    }

    #[test]
    fn fallback_news_follows_thresholds() {
        let quiet = fallback_news(&MetricDelta::default());
        assert_eq!(quiet.len(), 1);
        assert_eq!(quiet[0].sentiment, Sentiment::Neutral);

        let boom = fallback_news(&MetricDelta {
            satisfaction: -6,
            economy: 5,
            environment: 0,
        });
        assert_eq!(boom.len(), 2);
        assert_eq!(boom[0].title, "Investor confidence rebounds");
        assert_eq!(boom[1].sentiment, Sentiment::Negative);
    }

    #[test]
    fn canned_narrative_reports_signed_numbers() {
        let text = canned_narrative(
            &MetricDelta {
                satisfaction: 2,
                economy: 0,
                environment: -1,
            },
            -45,
        );
        assert!(text.contains("satisfaction by +2"));
        assert!(text.contains("environment by -1"));
        assert!(text.contains("-45k"));
    }
}
