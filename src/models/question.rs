use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::FeedbackRecord;
use crate::stages::Stage;

/// Why a stage degraded to its fallback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The generator failed or returned no usable text
    Generation,
    /// The reply had no fenced block
    NoJsonBlock,
    /// The fenced block did not parse
    MalformedJson,
    /// The agent call itself panicked
    Panicked,
}

/// Structured record of one degraded stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

/// State threaded through the workflow, one per question
#[derive(Debug, Clone, Serialize)]
pub struct QuestionState {
    /// Current text; replaced at most once by the improvement stage
    question_text: String,
    original_question_text: String,
    #[serde(skip)]
    improved: bool,
    pub correctness_feedback: FeedbackRecord,
    pub language_feedback: FeedbackRecord,
    pub improvement_feedback: FeedbackRecord,
    pub metadata_feedback: FeedbackRecord,
    /// Node-level failure descriptions
    pub errors: Vec<String>,
    /// Every degraded stage, agent-level or node-level
    pub failures: Vec<StageFailure>,
}

impl QuestionState {
    pub fn new(question_text: impl Into<String>) -> Self {
        let question_text = question_text.into();
        Self {
            original_question_text: question_text.clone(),
            question_text,
            improved: false,
            correctness_feedback: Value::Object(Map::new()),
            language_feedback: Value::Object(Map::new()),
            improvement_feedback: Value::Object(Map::new()),
            metadata_feedback: Value::Object(Map::new()),
            errors: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn original_question_text(&self) -> &str {
        &self.original_question_text
    }

    /// Replace the current text with the improved one.
    ///
    /// Only the first call takes effect; returns whether the text was replaced.
    pub(crate) fn apply_improvement(&mut self, text: impl Into<String>) -> bool {
        if self.improved {
            return false;
        }
        self.question_text = text.into();
        self.improved = true;
        true
    }

    pub fn feedback(&self, stage: Stage) -> &FeedbackRecord {
        match stage {
            Stage::Correctness => &self.correctness_feedback,
            Stage::Language => &self.language_feedback,
            Stage::Improvement => &self.improvement_feedback,
            Stage::Metadata => &self.metadata_feedback,
        }
    }

    pub fn set_feedback(&mut self, stage: Stage, feedback: FeedbackRecord) {
        let slot = match stage {
            Stage::Correctness => &mut self.correctness_feedback,
            Stage::Language => &mut self.language_feedback,
            Stage::Improvement => &mut self.improvement_feedback,
            Stage::Metadata => &mut self.metadata_feedback,
        };
        *slot = feedback;
    }

    /// True if any stage fell back
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_state() {
        let state = QuestionState::new("What is 2+2?");
        assert_eq!(state.question_text(), "What is 2+2?");
        assert_eq!(state.original_question_text(), "What is 2+2?");
        for stage in Stage::ORDER {
            assert_eq!(state.feedback(stage), &json!({}));
        }
        assert!(!state.is_degraded());
    }

    #[test]
    fn test_set_feedback_targets_one_slot() {
        let mut state = QuestionState::new("Q");
        state.set_feedback(Stage::Language, json!({"issues_found": false}));
        assert_eq!(state.language_feedback, json!({"issues_found": false}));
        assert_eq!(state.correctness_feedback, json!({}));
    }

    #[test]
    fn test_improvement_applies_once() {
        let mut state = QuestionState::new("What is 2+2?");
        assert!(state.apply_improvement("What is 2 + 2?"));
        assert!(!state.apply_improvement("What is two plus two?"));
        assert_eq!(state.question_text(), "What is 2 + 2?");
        assert_eq!(state.original_question_text(), "What is 2+2?");
    }
}
