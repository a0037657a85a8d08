//! Live product questions and answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::collections::{Identified, MergedCollection};
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// A shopper question about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Server id.
    #[serde(rename = "_id", alias = "id", deserialize_with = "string_id")]
    pub id: String,
    /// Question text.
    #[serde(alias = "question")]
    pub content: String,
    /// Display name of the asker.
    #[serde(default)]
    pub asked_by: Option<String>,
    /// Seller's answer.
    #[serde(default)]
    pub answer: Option<String>,
    /// When it was answered.
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
    /// When it was asked.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Returns true once answered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

impl Identified for Question {
    fn identity(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
struct NewQuestion {
    #[serde(deserialize_with = "string_id")]
    product_id: String,
    question: Question,
}

#[derive(Debug, Deserialize)]
struct QuestionAnswered {
    #[serde(deserialize_with = "string_id")]
    product_id: String,
    #[serde(deserialize_with = "string_id")]
    question_id: String,
    answer: String,
    #[serde(default)]
    answered_at: Option<DateTime<Utc>>,
}

/// Questions of one product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionState {
    /// REST snapshot plus questions asked since.
    pub questions: MergedCollection<Question>,
}

impl QuestionState {
    /// Newest first, each id once.
    #[must_use]
    pub fn merged(&self) -> Vec<Question> {
        self.questions.merged()
    }

    /// Questions still waiting for the seller.
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.questions
            .merged()
            .iter()
            .filter(|question| !question.is_answered())
            .count()
    }
}

/// Q&A feed for one product. Answers are patched into the question in place.
#[derive(Debug)]
pub struct QuestionFeature {
    cache: QueryCache,
}

impl QuestionFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }
}

impl Feature for QuestionFeature {
    type State = QuestionState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Product)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::NEW_QUESTION, events::QUESTION_ANSWERED]
    }

    fn initial_state(&self) -> QuestionState {
        QuestionState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<QuestionState>) {
        let product_id = if event == events::NEW_QUESTION {
            let Some(NewQuestion {
                product_id,
                question,
            }) = decode(event, payload)
            else {
                return;
            };
            state.send_if_modified(|current| current.questions.push_realtime(question));
            product_id
        } else {
            let Some(answered) = decode::<QuestionAnswered>(event, payload) else {
                return;
            };
            state.send_if_modified(|current| {
                current.questions.update(&answered.question_id, |question| {
                    question.answer = Some(answered.answer.clone());
                    question.answered_at = answered.answered_at;
                })
            });
            answered.product_id
        };

        self.cache.invalidate(&keys::questions(&product_id));
    }
}

/// Live Q&A of one product.
pub type QuestionFeed = Binding<QuestionFeature>;

impl Binding<QuestionFeature> {
    /// Follows the questions of a product.
    pub fn new(ctx: &RealtimeContext, product_id: Option<String>) -> Self {
        Self::bind(ctx, QuestionFeature::new(ctx.cache().clone()), product_id)
    }

    /// Replaces the REST snapshot after a fetch.
    pub fn apply_snapshot(&self, questions: Vec<Question>) {
        self.modify(|state| state.questions.replace_snapshot(questions));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            content: "Does it fit?".to_string(),
            asked_by: None,
            answer: None,
            answered_at: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_new_question_then_answer() {
        let harness = Harness::connected().await;
        let cache = harness.ctx.cache().clone();
        cache.store(keys::questions("P1"), json!([]));
        let feed = QuestionFeed::new(&harness.ctx, Some("P1".to_string()));
        feed.apply_snapshot(vec![question("q1")]);

        harness
            .push(
                "new_question",
                json!({"product_id": "P1", "question": {"_id": "q2", "question": "Colour?"}}),
            )
            .await;
        assert_eq!(feed.snapshot().unanswered(), 2);

        harness
            .push(
                "question_answered",
                json!({"product_id": "P1", "question_id": "q1", "answer": "Yes", "answered_at": "2026-01-01T00:00:00Z"}),
            )
            .await;

        let state = feed.snapshot();
        let merged = state.merged();
        assert_eq!(merged[0].id, "q2");
        assert_eq!(merged[1].answer.as_deref(), Some("Yes"));
        assert_eq!(state.unanswered(), 1);
        assert!(cache.is_stale(&keys::questions("P1")));
    }

    #[tokio::test]
    async fn test_answer_for_unknown_question_ignored() {
        let harness = Harness::connected().await;
        let feed = QuestionFeed::new(&harness.ctx, Some("P1".to_string()));
        let mut rx = feed.state();

        harness
            .push(
                "question_answered",
                json!({"product_id": "P1", "question_id": "missing", "answer": "?"}),
            )
            .await;

        assert!(!rx.has_changed().expect("open"));
    }

    #[tokio::test]
    async fn test_duplicate_question_kept_once() {
        let harness = Harness::connected().await;
        let feed = QuestionFeed::new(&harness.ctx, Some("P1".to_string()));
        let asked = json!({"product_id": "P1", "question": {"_id": "q1", "content": "Size?"}});

        harness.push("new_question", asked.clone()).await;
        harness.push("new_question", asked).await;

        assert_eq!(feed.snapshot().merged().len(), 1);
    }
}
